use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::rates::source::UpstreamError;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("Validation error: {0}")]
  ValidationError(String),

  #[error("Upstream error: {0}")]
  UpstreamError(#[from] UpstreamError),

  #[error("Timeout error: {0}")]
  TimeoutError(String),

  #[error("Config error: {0}")]
  ConfigError(String),

  #[error("Internal server error: {0}")]
  InternalError(String),
}

impl AppError {
  pub fn status_code(&self) -> StatusCode {
      match self {
          AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
          AppError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
          AppError::TimeoutError(_) => StatusCode::REQUEST_TIMEOUT,
          AppError::ConfigError(_) | AppError::InternalError(_) => {
              StatusCode::INTERNAL_SERVER_ERROR
          }
      }
  }

  /// Message surfaced to the caller, without the variant prefix.
  pub fn message(&self) -> String {
      match self {
          AppError::ValidationError(msg)
          | AppError::TimeoutError(msg)
          | AppError::ConfigError(msg)
          | AppError::InternalError(msg) => msg.clone(),
          AppError::UpstreamError(err) => err.to_string(),
      }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
      let status = self.status_code();
      if status.is_server_error() {
          tracing::error!(error = %self, "request failed");
      }

      let body = Json(json!({
          "error": self.message(),
      }));

      (status, body).into_response()
  }
}
