pub mod coinapi;
pub mod fallback;

use async_trait::async_trait;
use thiserror::Error;

use crate::rates::model::RateSet;

pub use coinapi::CoinApiSource;
pub use fallback::FallbackSource;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request to quote provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quote provider returned status {0}")]
    Status(u16),

    #[error("malformed quote provider payload: {0}")]
    Malformed(String),
}

/// A provider able to produce a complete rate set for a quote currency.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self, quote: &str) -> Result<RateSet, UpstreamError>;

    fn name(&self) -> &str;
}
