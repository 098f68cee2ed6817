use std::env;
use chrono::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub app_env: AppEnv,
    pub coinapi_key: Option<String>,
    pub coinapi_base_url: String,
    pub default_quote: String,
    pub rate_cache_ttl: Duration,
    pub upstream_timeout: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

pub const DEFAULT_COINAPI_BASE_URL: &str = "https://rest.coinapi.io/v1";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "127.0.0.1".into(),
            app_env: AppEnv::Development,
            coinapi_key: None,
            coinapi_base_url: DEFAULT_COINAPI_BASE_URL.into(),
            default_quote: "EUR".into(),
            rate_cache_ttl: Duration::minutes(5),
            upstream_timeout: Duration::seconds(5),
            request_timeout: Duration::seconds(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        // Server config
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse::<u16>()
            .map_err(|_| AppError::ConfigError("Invalid PORT".into()))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());

        let app_env_str = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let app_env = match app_env_str.to_lowercase().as_str() {
            "production" => AppEnv::Production,
            "test" => AppEnv::Test,
            _ => AppEnv::Development,
        };

        // Upstream quote provider; an empty key counts as unconfigured
        let coinapi_key = env::var("COINAPI_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let coinapi_base_url = env::var("COINAPI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_COINAPI_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let default_quote = env::var("DEFAULT_QUOTE")
            .unwrap_or_else(|_| "EUR".into())
            .to_uppercase();
        if !is_currency_code(&default_quote) {
            return Err(AppError::ConfigError(
                "DEFAULT_QUOTE must be a 3-letter currency code".into(),
            ));
        }

        // Timing
        let rate_cache_ttl_str = env::var("RATE_CACHE_TTL").unwrap_or_else(|_| "5m".into());
        let rate_cache_ttl = parse_duration(&rate_cache_ttl_str)
            .map_err(|_| AppError::ConfigError("Invalid RATE_CACHE_TTL format".into()))?;

        let upstream_timeout_str = env::var("UPSTREAM_TIMEOUT").unwrap_or_else(|_| "5s".into());
        let upstream_timeout = parse_duration(&upstream_timeout_str)
            .map_err(|_| AppError::ConfigError("Invalid UPSTREAM_TIMEOUT format".into()))?;

        let request_timeout_str = env::var("REQUEST_TIMEOUT").unwrap_or_else(|_| "10s".into());
        let request_timeout = parse_duration(&request_timeout_str)
            .map_err(|_| AppError::ConfigError("Invalid REQUEST_TIMEOUT format".into()))?;

        Ok(Self {
            port,
            host,
            app_env,
            coinapi_key,
            coinapi_base_url,
            default_quote,
            rate_cache_ttl,
            upstream_timeout,
            request_timeout,
        })
    }
}

/// Three ASCII letters, e.g. `EUR`.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

fn parse_duration(duration_str: &str) -> Result<Duration, &'static str> {
    let duration_str = duration_str.trim();

    if duration_str.is_empty() {
        return Err("Duration string is empty");
    }

    // Extract the number and unit parts
    let len = duration_str.len();
    let (num_part, unit_part) = duration_str.split_at(
        duration_str
            .chars()
            .position(|c| !c.is_ascii_digit())
            .unwrap_or(len)
    );

    let num = num_part.parse::<i64>().map_err(|_| "Invalid number")?;

    match unit_part {
        "s" => Ok(Duration::seconds(num)),
        "m" => Ok(Duration::minutes(num)),
        "h" => Ok(Duration::hours(num)),
        "d" => Ok(Duration::days(num)),
        _ => Err("Unknown time unit, use s, m, h, or d"),
    }
}
