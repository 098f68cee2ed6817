use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::rates::{
    model::{RateEntry, RateOrigin, RateSet, Symbol},
    source::{RateSource, UpstreamError},
};

const API_KEY_HEADER: &str = "X-CoinAPI-Key";

#[derive(Debug, Deserialize)]
pub struct ExchangeRateResponse {
    pub time: Option<String>,
    pub asset_id_base: String,
    pub asset_id_quote: String,
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvCandle {
    pub time_period_start: Option<String>,
    pub rate_open: f64,
    pub rate_high: f64,
    pub rate_low: f64,
    pub rate_close: f64,
}

/// Live quotes from a CoinAPI-compatible REST endpoint.
#[derive(Clone)]
pub struct CoinApiSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoinApiSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("crypto-rates-service/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        debug!("Calling quote provider: {}", url);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    pub async fn exchange_rate(
        &self,
        symbol: Symbol,
        quote: &str,
    ) -> Result<ExchangeRateResponse, UpstreamError> {
        let url = format!("{}/exchangerate/{}/{}", self.base_url, symbol, quote);
        let rate: ExchangeRateResponse = self.get_json(&url, &[]).await?;

        if !rate.rate.is_finite() || rate.rate <= 0.0 {
            return Err(UpstreamError::Malformed(format!(
                "non-positive rate {} for {}/{}",
                rate.rate, rate.asset_id_base, rate.asset_id_quote
            )));
        }

        Ok(rate)
    }

    pub async fn daily_ohlc(
        &self,
        symbol: Symbol,
        quote: &str,
    ) -> Result<Vec<OhlcvCandle>, UpstreamError> {
        let url = format!("{}/ohlcv/{}/{}/latest", self.base_url, symbol, quote);
        self.get_json(&url, &[("period_id", "1DAY"), ("limit", "1")])
            .await
    }

    async fn fetch_entry(&self, symbol: Symbol, quote: &str) -> Result<RateEntry, UpstreamError> {
        let (rate, candles) = tokio::try_join!(
            self.exchange_rate(symbol, quote),
            self.daily_ohlc(symbol, quote)
        )?;

        Ok(RateEntry {
            symbol,
            price: rate.rate,
            change_24h: change_from_candles(&candles)?,
            last_updated: parse_time(rate.time.as_deref()),
            source: RateOrigin::Live,
        })
    }
}

/// Percent change between the latest daily open and close.
pub fn change_from_candles(candles: &[OhlcvCandle]) -> Result<f64, UpstreamError> {
    let candle = candles
        .first()
        .ok_or_else(|| UpstreamError::Malformed("empty OHLCV response".into()))?;

    if !candle.rate_open.is_finite() || candle.rate_open <= 0.0 || !candle.rate_close.is_finite() {
        return Err(UpstreamError::Malformed(format!(
            "unusable daily candle open={} close={}",
            candle.rate_open, candle.rate_close
        )));
    }

    Ok((candle.rate_close - candle.rate_open) / candle.rate_open * 100.0)
}

fn parse_time(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl RateSource for CoinApiSource {
    async fn fetch(&self, quote: &str) -> Result<RateSet, UpstreamError> {
        let mut entries = Vec::with_capacity(Symbol::ALL.len());
        for symbol in Symbol::ALL {
            entries.push(self.fetch_entry(symbol, quote).await?);
        }

        let set = RateSet::from_entries(entries)
            .ok_or_else(|| UpstreamError::Malformed("incomplete rate set".into()))?;
        info!("Fetched live rates for {} symbols in {}", set.len(), quote);
        Ok(set)
    }

    fn name(&self) -> &str {
        "coinapi"
    }
}
