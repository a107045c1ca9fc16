// Storage for 1-minute candles and open positions
pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use uuid::Uuid;

use crate::models::{Candle, TrackedPosition};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PostgresPersistence;

/// Source of base candles and sink for trailed stop-losses
///
/// One row per `(symbol, minute)`; the monitor only ever reads candles and
/// writes back stop-loss values that moved.
pub trait CandleStore: Send + Sync {
    /// Most recent `limit` 1-minute candles with `bucket_start <= until`,
    /// returned oldest first
    fn load_candles_until(
        &self,
        symbol: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Positions whose stop-loss should be trailed
    fn load_open_positions(&self) -> impl Future<Output = Result<Vec<TrackedPosition>>> + Send;

    /// Persist a stop-loss that moved
    fn update_stop_loss(
        &self,
        position_id: Uuid,
        stop_loss: Decimal,
    ) -> impl Future<Output = Result<()>> + Send;
}
