use axum::{routing::get, Router};

use crate::rates::{
  handler::{self, RatesState},
  service::RateService,
};

/// Path the browser client polls when deployed behind serverless functions.
pub const FUNCTIONS_PATH: &str = "/.netlify/functions/crypto-api";

pub fn rates_routes(service: RateService, default_quote: String) -> Router {
  let state = RatesState {
      service,
      default_quote,
  };
  let endpoint = get(handler::crypto_api).options(handler::preflight);

  Router::new()
      .route("/api/v1/crypto", endpoint.clone())
      .route(FUNCTIONS_PATH, endpoint)
      .with_state(state)
}
