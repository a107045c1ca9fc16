use rust_decimal::Decimal;

use super::evaluator::compute_next_stop_loss;
use crate::aggregation::{
    evaluation_window, required_base_count, trim, AggregationError, CandleAggregator,
    CandleInterval, MAX_LOOKBACK,
};
use crate::models::{Candle, Side, StopLossUpdate};

/// Aggregate → trim → evaluate, configured once per strategy
///
/// Holds no state between calls; every evaluation aggregates its own base
/// candle snapshot from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingStop {
    interval: CandleInterval,
    lookback: usize,
}

impl TrailingStop {
    /// # Arguments
    /// * `interval` - Aggregation timeframe for the evaluation candles
    /// * `lookback` - Aggregated candles in the averaging window, clamped to
    ///   `1..=MAX_LOOKBACK`
    pub fn new(interval: CandleInterval, lookback: usize) -> Self {
        Self {
            interval,
            lookback: lookback.clamp(1, MAX_LOOKBACK),
        }
    }

    /// # Errors
    /// `InvalidInterval` unless `interval_minutes` is 5, 15, 30 or 45
    pub fn from_minutes(interval_minutes: u32, lookback: usize) -> Result<Self, AggregationError> {
        Ok(Self::new(CandleInterval::try_from(interval_minutes)?, lookback))
    }

    pub fn interval(&self) -> CandleInterval {
        self.interval
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Number of 1-minute candles to load before calling [`evaluate`](Self::evaluate)
    pub fn base_candles_needed(&self) -> usize {
        required_base_count(self.lookback, self.interval.minutes() as usize)
    }

    /// Aggregate ascending base candles and trim to the evaluation window
    pub fn window(&self, base_candles: &[Candle]) -> Vec<Candle> {
        let aggregated = CandleAggregator::new(self.interval).aggregate(base_candles);
        trim(aggregated, evaluation_window(self.lookback))
    }

    /// Compute the next stop-loss from ascending 1-minute candles
    pub fn evaluate(
        &self,
        side: Side,
        current_stop_loss: Decimal,
        base_candles: &[Candle],
    ) -> StopLossUpdate {
        let window = self.window(base_candles);
        compute_next_stop_loss(side, current_stop_loss, &window, self.lookback)
    }
}
