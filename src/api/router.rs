use axum::{
  error_handling::HandleErrorLayer,
  http::{header, HeaderValue, StatusCode},
  routing::get,
  BoxError, Json, Router,
};
use serde_json::json;
use tower::{
  timeout::{error::Elapsed, TimeoutLayer},
  ServiceBuilder,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
  config::Config,
  error::AppError,
  rates::{routes::rates_routes, service::RateService},
};

pub fn create_router(config: &Config) -> Result<Router, AppError> {
  let rate_service = RateService::from_config(config)?;
  build_router(rate_service, config)
}

pub fn build_router(rate_service: RateService, config: &Config) -> Result<Router, AppError> {
  let request_timeout = config
      .request_timeout
      .to_std()
      .map_err(|_| AppError::ConfigError("REQUEST_TIMEOUT must be positive".into()))?;

  // Setup routes
  let api_routes = Router::new().route("/health", get(health_check));

  // Every response carries the same CORS header set, preflight and errors included
  let app = Router::new()
      .nest("/api/v1", api_routes)
      .merge(rates_routes(rate_service, config.default_quote.clone()))
      .layer(
          ServiceBuilder::new()
              .layer(HandleErrorLayer::new(handle_timeout))
              .layer(TimeoutLayer::new(request_timeout)),
      )
      .layer(SetResponseHeaderLayer::overriding(
          header::ACCESS_CONTROL_ALLOW_ORIGIN,
          HeaderValue::from_static("*"),
      ))
      .layer(SetResponseHeaderLayer::overriding(
          header::ACCESS_CONTROL_ALLOW_HEADERS,
          HeaderValue::from_static("Content-Type, Authorization"),
      ))
      .layer(SetResponseHeaderLayer::overriding(
          header::ACCESS_CONTROL_ALLOW_METHODS,
          HeaderValue::from_static("GET, OPTIONS"),
      ))
      .layer(TraceLayer::new_for_http());

  Ok(app)
}

async fn handle_timeout(err: BoxError) -> AppError {
  if err.is::<Elapsed>() {
      AppError::TimeoutError("Request timed out".into())
  } else {
      AppError::InternalError(err.to_string())
  }
}

async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
  (
      StatusCode::OK,
      Json(json!({
          "status": "success",
          "message": "Server is running"
      })),
  )
}
