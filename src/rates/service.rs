use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::Config,
    error::AppError,
    rates::{
        cache::RateCache,
        model::{ConvertResponse, PriceResponse, RateSet, Symbol},
        source::{CoinApiSource, FallbackSource, RateSource},
    },
};

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RateService {
    live: Option<Arc<dyn RateSource>>,
    fallback: Arc<FallbackSource>,
    cache: Arc<RateCache>,
    upstream_timeout: Duration,
    // One lock per quote so concurrent misses for a quote share one upstream fetch
    refresh_locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RateService {
    pub fn new(
        live: Option<Arc<dyn RateSource>>,
        fallback: FallbackSource,
        cache: Arc<RateCache>,
    ) -> Self {
        Self {
            live,
            fallback: Arc::new(fallback),
            cache,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            refresh_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let upstream_timeout = config
            .upstream_timeout
            .to_std()
            .map_err(|_| AppError::ConfigError("UPSTREAM_TIMEOUT must be positive".into()))?;

        let live: Option<Arc<dyn RateSource>> = match &config.coinapi_key {
            Some(key) => {
                let source = CoinApiSource::new(&config.coinapi_base_url, key, upstream_timeout)
                    .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
                info!("Live quotes enabled via {}", config.coinapi_base_url);
                Some(Arc::new(source) as Arc<dyn RateSource>)
            }
            None => {
                warn!("COINAPI_KEY not set, serving fallback rates only");
                None
            }
        };

        let cache = Arc::new(RateCache::new(config.rate_cache_ttl));
        Ok(Self::new(live, FallbackSource::new(), cache).with_upstream_timeout(upstream_timeout))
    }

    /// Current rate set for `quote`; never fails, degrading to fallback rates.
    pub async fn rates(&self, quote: &str) -> RateSet {
        if let Some(set) = self.cache.get(quote) {
            return set;
        }

        let lock = self.refresh_lock(quote);
        let _guard = lock.lock().await;
        // Another request may have refreshed while we waited
        if let Some(set) = self.cache.get(quote) {
            return set;
        }

        let set = self.refresh(quote).await;
        self.cache.put(quote, set.clone());
        set
    }

    fn refresh_lock(&self, quote: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(quote.to_string()).or_default().clone()
    }

    async fn refresh(&self, quote: &str) -> RateSet {
        let Some(live) = &self.live else {
            return self.fallback.generate(quote);
        };

        match tokio::time::timeout(self.upstream_timeout, live.fetch(quote)).await {
            Ok(Ok(set)) => {
                info!("Refreshed {} rates from {}", quote, live.name());
                set
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Live rates from {} unavailable, using fallback", live.name());
                self.fallback.generate(quote)
            }
            Err(_) => {
                warn!(
                    "Live rates from {} timed out after {:?}, using fallback",
                    live.name(),
                    self.upstream_timeout
                );
                self.fallback.generate(quote)
            }
        }
    }

    pub async fn convert(
        &self,
        from: Symbol,
        to: Symbol,
        amount: f64,
        quote: &str,
    ) -> Result<ConvertResponse, AppError> {
        let set = self.rates(quote).await;
        convert_with(&set, from, to, amount, quote)
    }

    pub async fn price(&self, symbol: Symbol, quote: &str) -> Result<PriceResponse, AppError> {
        let set = self.rates(quote).await;
        let entry = set
            .get(symbol)
            .ok_or_else(|| AppError::InternalError(format!("No rate for {}", symbol)))?;
        Ok(PriceResponse::from_entry(entry, quote))
    }
}

pub fn convert_with(
    set: &RateSet,
    from: Symbol,
    to: Symbol,
    amount: f64,
    quote: &str,
) -> Result<ConvertResponse, AppError> {
    let price = |symbol: Symbol| {
        set.get(symbol)
            .map(|entry| entry.price)
            .ok_or_else(|| AppError::InternalError(format!("No rate for {}", symbol)))
    };
    let (from_price, to_price) = (price(from)?, price(to)?);
    let rate = from_price / to_price;
    let result = amount * rate;
    let usd_value = amount * from_price;

    if !result.is_finite() || !usd_value.is_finite() {
        return Err(AppError::ValidationError(format!(
            "Amount too large: {}",
            amount
        )));
    }

    Ok(ConvertResponse {
        from,
        to,
        amount,
        result,
        rate,
        usd_value,
        timestamp: Utc::now(),
        quote: quote.to_string(),
    })
}
