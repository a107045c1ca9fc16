// Core modules
pub mod aggregation;
pub mod config;
pub mod db;
pub mod models;
pub mod monitor;
pub mod stop_loss;

// Re-export commonly used types
pub use aggregation::{AggregationError, CandleAggregator, CandleInterval};
pub use models::*;
pub use stop_loss::{compute_next_stop_loss, TrailingStop};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
