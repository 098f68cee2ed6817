use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{config::is_currency_code, error::AppError};

// Supported assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
    Usdt,
    Usdc,
}

impl Symbol {
    pub const ALL: [Symbol; 4] = [Symbol::Btc, Symbol::Eth, Symbol::Usdt, Symbol::Usdc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
            Symbol::Usdt => "USDT",
            Symbol::Usdc => "USDC",
        }
    }

    /// Stablecoins track a fiat peg and get much tighter fallback bounds.
    pub fn is_stable(&self) -> bool {
        matches!(self, Symbol::Usdt | Symbol::Usdc)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(Symbol::Btc),
            "ETH" => Ok(Symbol::Eth),
            "USDT" => Ok(Symbol::Usdt),
            "USDC" => Ok(Symbol::Usdc),
            other => Err(AppError::ValidationError(format!(
                "Unsupported symbol: {}. Supported: BTC, ETH, USDT, USDC",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOrigin {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub symbol: Symbol,
    pub price: f64,
    pub change_24h: f64,
    pub last_updated: DateTime<Utc>,
    pub source: RateOrigin,
}

/// One entry per supported symbol, all with a positive price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RateSet(BTreeMap<Symbol, RateEntry>);

impl RateSet {
    /// Returns `None` unless every supported symbol has a valid entry.
    pub fn from_entries(entries: impl IntoIterator<Item = RateEntry>) -> Option<Self> {
        let map: BTreeMap<Symbol, RateEntry> = entries
            .into_iter()
            .map(|entry| (entry.symbol, entry))
            .collect();

        let complete = Symbol::ALL.iter().all(|symbol| {
            map.get(symbol)
                .map(|entry| entry.price.is_finite() && entry.price > 0.0)
                .unwrap_or(false)
        });

        complete.then_some(Self(map))
    }

    /// Builds a set covering every symbol from a per-symbol entry function.
    pub(crate) fn from_fn(mut entry: impl FnMut(Symbol) -> RateEntry) -> Self {
        Self(Symbol::ALL.iter().map(|&symbol| (symbol, entry(symbol))).collect())
    }

    pub fn get(&self, symbol: Symbol) -> Option<&RateEntry> {
        self.0.get(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateEntry> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sets are produced by a single source, so the first entry speaks for all.
    pub fn origin(&self) -> RateOrigin {
        self.iter()
            .next()
            .map(|entry| entry.source)
            .unwrap_or(RateOrigin::Fallback)
    }
}

// Raw query string, as sent by the browser client
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct RateQuery {
    pub action: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
    #[validate(custom = "validate_quote")]
    pub quote: Option<String>,
}

fn validate_quote(quote: &str) -> Result<(), ValidationError> {
    if is_currency_code(quote) {
        Ok(())
    } else {
        Err(ValidationError::new("currency_code"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateRequest {
    Rates {
        quote: String,
    },
    Convert {
        from: Symbol,
        to: Symbol,
        amount: f64,
        quote: String,
    },
    Price {
        symbol: Symbol,
        quote: String,
    },
}

impl RateRequest {
    pub fn parse(mut query: RateQuery, default_quote: &str) -> Result<Self, AppError> {
        query.quote = Some(
            non_empty(&query.quote)
                .unwrap_or(default_quote)
                .to_uppercase(),
        );
        let quote = query.quote.clone().unwrap_or_default();
        if query.validate().is_err() {
            return Err(AppError::ValidationError(format!(
                "Invalid parameters: quote must be a 3-letter currency code, got {}",
                quote
            )));
        }

        let action = query
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("rates")
            .to_lowercase();

        match action.as_str() {
            "rates" => Ok(RateRequest::Rates { quote }),
            "convert" => {
                let (from, to, amount) = match (
                    non_empty(&query.from),
                    non_empty(&query.to),
                    non_empty(&query.amount),
                ) {
                    (Some(from), Some(to), Some(amount)) => (from, to, amount),
                    _ => {
                        return Err(AppError::ValidationError(
                            "Missing required parameters: from, to, amount".into(),
                        ))
                    }
                };

                Ok(RateRequest::Convert {
                    from: from.parse()?,
                    to: to.parse()?,
                    amount: parse_amount(amount)?,
                    quote,
                })
            }
            "price" => {
                let symbol = non_empty(&query.from)
                    .or_else(|| non_empty(&query.to))
                    .unwrap_or("BTC")
                    .parse()?;
                Ok(RateRequest::Price { symbol, quote })
            }
            _ => Err(AppError::ValidationError(
                "Invalid action. Use: rates, convert, price".into(),
            )),
        }
    }

    pub fn quote(&self) -> &str {
        match self {
            RateRequest::Rates { quote }
            | RateRequest::Convert { quote, .. }
            | RateRequest::Price { quote, .. } => quote,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_amount(raw: &str) -> Result<f64, AppError> {
    match raw.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(AppError::ValidationError(format!(
            "Invalid amount: {}. Must be a non-negative number",
            raw
        ))),
    }
}

// Response payloads
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub quote: String,
}

impl<T> ApiEnvelope<T> {
    pub fn new(data: T, quote: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
            quote: quote.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub from: Symbol,
    pub to: Symbol,
    pub amount: f64,
    pub result: f64,
    pub rate: f64,
    // amount * price(from) in the quote currency; only a USD value when quote=USD
    pub usd_value: f64,
    pub timestamp: DateTime<Utc>,
    pub quote: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: Symbol,
    pub price: f64,
    pub change_24h: f64,
    pub last_updated: DateTime<Utc>,
    pub quote: String,
}

impl PriceResponse {
    pub fn from_entry(entry: &RateEntry, quote: impl Into<String>) -> Self {
        Self {
            symbol: entry.symbol,
            price: entry.price,
            change_24h: entry.change_24h,
            last_updated: entry.last_updated,
            quote: quote.into(),
        }
    }
}
