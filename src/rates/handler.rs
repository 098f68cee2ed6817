use axum::{
  extract::{rejection::QueryRejection, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};

use crate::{
  error::AppError,
  rates::{
      model::{ApiEnvelope, RateQuery, RateRequest},
      service::RateService,
  },
};

#[derive(Clone)]
pub struct RatesState {
  pub service: RateService,
  pub default_quote: String,
}

// Single query-string driven endpoint: ?action=rates|convert|price
pub async fn crypto_api(
  State(state): State<RatesState>,
  query: Result<Query<RateQuery>, QueryRejection>,
) -> Result<Response, AppError> {
  let Query(query) =
      query.map_err(|e| AppError::ValidationError(format!("Invalid query string: {}", e)))?;
  let request = RateRequest::parse(query, &state.default_quote)?;

  let response = match request {
      RateRequest::Rates { quote } => {
          let rates = state.service.rates(&quote).await;
          Json(ApiEnvelope::new(rates, quote)).into_response()
      }
      RateRequest::Convert { from, to, amount, quote } => {
          let conversion = state.service.convert(from, to, amount, &quote).await?;
          Json(ApiEnvelope::new(conversion, quote)).into_response()
      }
      RateRequest::Price { symbol, quote } => {
          let price = state.service.price(symbol, &quote).await?;
          Json(ApiEnvelope::new(price, quote)).into_response()
      }
  };

  Ok(response)
}

pub async fn preflight() -> StatusCode {
  StatusCode::OK
}
