use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::CandleStore;
use crate::models::{Candle, TrackedPosition};
use crate::Result;

/// Thread-safe in-memory candle and position store
///
/// Keeps candles per symbol keyed by bucket start, so re-adding a minute
/// replaces it (same uniqueness as the `(symbol, bucket_start)` table).
/// Useful for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    candles: Arc<RwLock<HashMap<String, BTreeMap<DateTime<Utc>, Candle>>>>,
    positions: Arc<RwLock<Vec<TrackedPosition>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a 1-minute candle
    pub fn add_candle(&self, candle: Candle) -> Result<()> {
        let mut data = self.candles.write().map_err(|e| e.to_string())?;

        data.entry(candle.symbol.clone())
            .or_default()
            .insert(candle.bucket_start, candle);

        Ok(())
    }

    pub fn add_candles(&self, candles: impl IntoIterator<Item = Candle>) -> Result<()> {
        for candle in candles {
            self.add_candle(candle)?;
        }
        Ok(())
    }

    /// Get count of candles for a symbol
    pub fn candle_count(&self, symbol: &str) -> Result<usize> {
        let data = self.candles.read().map_err(|e| e.to_string())?;
        Ok(data.get(symbol).map(|c| c.len()).unwrap_or(0))
    }

    /// Track a new open position
    pub fn add_position(&self, position: TrackedPosition) -> Result<()> {
        let mut positions = self.positions.write().map_err(|e| e.to_string())?;
        positions.push(position);
        Ok(())
    }

    /// Stop tracking a position (it closed)
    pub fn remove_position(&self, position_id: Uuid) -> Result<()> {
        let mut positions = self.positions.write().map_err(|e| e.to_string())?;
        positions.retain(|p| p.id != position_id);
        Ok(())
    }

    /// Current state of a tracked position
    pub fn position(&self, position_id: Uuid) -> Result<Option<TrackedPosition>> {
        let positions = self.positions.read().map_err(|e| e.to_string())?;
        Ok(positions.iter().find(|p| p.id == position_id).cloned())
    }

    fn recent_candles(&self, symbol: &str, until: DateTime<Utc>, limit: usize) -> Result<Vec<Candle>> {
        let data = self.candles.read().map_err(|e| e.to_string())?;

        let mut recent: Vec<Candle> = data
            .get(symbol)
            .map(|by_time| {
                by_time
                    .range(..=until)
                    .rev()
                    .take(limit)
                    .map(|(_, candle)| candle.clone())
                    .collect()
            })
            .unwrap_or_default();

        // Newest-first from the range scan; callers want ascending
        recent.reverse();
        Ok(recent)
    }

    fn open_positions(&self) -> Result<Vec<TrackedPosition>> {
        let positions = self.positions.read().map_err(|e| e.to_string())?;
        Ok(positions.clone())
    }

    fn set_stop_loss(&self, position_id: Uuid, stop_loss: Decimal) -> Result<()> {
        let mut positions = self.positions.write().map_err(|e| e.to_string())?;

        let position = positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| format!("Position {} not found", position_id))?;
        position.stop_loss = stop_loss;

        Ok(())
    }
}

impl CandleStore for MemoryStore {
    async fn load_candles_until(
        &self,
        symbol: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.recent_candles(symbol, until, limit)
    }

    async fn load_open_positions(&self) -> Result<Vec<TrackedPosition>> {
        self.open_positions()
    }

    async fn update_stop_loss(&self, position_id: Uuid, stop_loss: Decimal) -> Result<()> {
        self.set_stop_loss(position_id, stop_loss)
    }
}
