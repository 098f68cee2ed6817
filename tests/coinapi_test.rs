use std::{sync::Arc, time::Duration};

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Duration as ChronoDuration;
use serde_json::json;

use crypto_rates_service::{
    rates::{
        cache::RateCache,
        model::{RateOrigin, Symbol},
        source::{CoinApiSource, FallbackSource, RateSource, UpstreamError},
    },
    RateService,
};

const KEY: &str = "test-key";

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("X-CoinAPI-Key").map(|v| v == KEY).unwrap_or(false)
}

fn price_of(base: &str) -> Option<(f64, f64)> {
    // (open, close)
    match base {
        "BTC" => Some((42000.0, 43000.0)),
        "ETH" => Some((2900.0, 2800.0)),
        "USDT" => Some((1.0, 1.0)),
        "USDC" => Some((1.0, 1.001)),
        _ => None,
    }
}

async fn exchange_rate(headers: HeaderMap, Path((base, quote)): Path<(String, String)>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid API key" }))).into_response();
    }
    match price_of(&base) {
        Some((_, close)) => Json(json!({
            "time": "2024-01-15T10:30:00.0000000Z",
            "asset_id_base": base,
            "asset_id_quote": quote,
            "rate": close,
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ohlcv(headers: HeaderMap, Path((base, _quote)): Path<(String, String)>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match price_of(&base) {
        Some((open, close)) => Json(json!([{
            "time_period_start": "2024-01-15T00:00:00.0000000Z",
            "time_period_end": "2024-01-16T00:00:00.0000000Z",
            "rate_open": open,
            "rate_high": open.max(close),
            "rate_low": open.min(close),
            "rate_close": close,
        }]))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn provider() -> Router {
    Router::new().nest(
        "/v1",
        Router::new()
            .route("/exchangerate/:base/:quote", get(exchange_rate))
            .route("/ohlcv/:base/:quote/latest", get(ohlcv)),
    )
}

#[tokio::test]
async fn fetches_live_rates_with_daily_change() {
    let base_url = spawn_upstream(provider()).await;
    let source = CoinApiSource::new(&base_url, KEY, Duration::from_secs(5)).unwrap();

    let set = source.fetch("EUR").await.unwrap();
    assert_eq!(set.len(), 4);
    assert_eq!(set.origin(), RateOrigin::Live);

    let btc = set.get(Symbol::Btc).unwrap();
    assert_eq!(btc.price, 43000.0);
    assert!((btc.change_24h - (1000.0 / 42000.0 * 100.0)).abs() < 1e-9);

    let eth = set.get(Symbol::Eth).unwrap();
    assert!(eth.change_24h < 0.0);
}

#[tokio::test]
async fn rejected_credential_is_an_upstream_error() {
    let base_url = spawn_upstream(provider()).await;
    let source = CoinApiSource::new(&base_url, "wrong-key", Duration::from_secs(5)).unwrap();

    let err = source.fetch("EUR").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status(401)));
}

#[tokio::test]
async fn malformed_payload_is_an_upstream_error() {
    let broken = Router::new().nest(
        "/v1",
        Router::new()
            .route("/exchangerate/:base/:quote", get(|| async { Json(json!({ "unexpected": true })) }))
            .route("/ohlcv/:base/:quote/latest", get(|| async { Json(json!([])) })),
    );
    let base_url = spawn_upstream(broken).await;
    let source = CoinApiSource::new(&base_url, KEY, Duration::from_secs(5)).unwrap();

    let err = source.fetch("EUR").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Malformed(_)));
}

#[tokio::test]
async fn slow_upstream_falls_back_after_timeout() {
    let slow = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        StatusCode::OK
    });
    let base_url = spawn_upstream(slow).await;
    let source = CoinApiSource::new(&base_url, KEY, Duration::from_secs(5)).unwrap();

    let service = RateService::new(
        Some(Arc::new(source) as Arc<dyn RateSource>),
        FallbackSource::seeded(8),
        Arc::new(RateCache::new(ChronoDuration::minutes(5))),
    )
    .with_upstream_timeout(Duration::from_millis(200));

    let set = service.rates("EUR").await;
    assert_eq!(set.len(), 4);
    assert_eq!(set.origin(), RateOrigin::Fallback);
}

#[tokio::test]
async fn unreachable_upstream_falls_back() {
    // Nothing listens on port 9 locally
    let source = CoinApiSource::new("http://127.0.0.1:9/v1", KEY, Duration::from_secs(1)).unwrap();
    let service = RateService::new(
        Some(Arc::new(source) as Arc<dyn RateSource>),
        FallbackSource::seeded(8),
        Arc::new(RateCache::new(ChronoDuration::minutes(5))),
    );

    let price = service.price(Symbol::Eth, "EUR").await.unwrap();
    assert!(price.price > 0.0);
    assert_eq!(service.rates("EUR").await.origin(), RateOrigin::Fallback);
}

async fn exchange_rate_without_usdc(
    headers: HeaderMap,
    Path((base, quote)): Path<(String, String)>,
) -> impl IntoResponse {
    if base == "USDC" {
        return StatusCode::NOT_FOUND.into_response();
    }
    exchange_rate(headers, Path((base, quote))).await.into_response()
}

#[tokio::test]
async fn one_failing_symbol_never_yields_a_live_set() {
    let partial = Router::new().nest(
        "/v1",
        Router::new()
            .route("/exchangerate/:base/:quote", get(exchange_rate_without_usdc))
            .route("/ohlcv/:base/:quote/latest", get(ohlcv)),
    );
    let base_url = spawn_upstream(partial).await;
    let source = CoinApiSource::new(&base_url, KEY, Duration::from_secs(5)).unwrap();

    let err = source.fetch("EUR").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status(404)));

    let service = RateService::new(
        Some(Arc::new(source) as Arc<dyn RateSource>),
        FallbackSource::seeded(8),
        Arc::new(RateCache::new(ChronoDuration::minutes(5))),
    );
    let set = service.rates("EUR").await;
    assert_eq!(set.len(), 4);
    assert!(set.iter().all(|entry| entry.source == RateOrigin::Fallback));
}
