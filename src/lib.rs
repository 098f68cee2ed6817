pub mod api;
pub mod config;
pub mod error;
pub mod rates;

// Re-export common modules
pub use api::router;
pub use config::Config;
pub use error::AppError;
pub use rates::service::RateService;
