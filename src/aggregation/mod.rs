// Candle aggregation: 1-minute candles into fixed higher-timeframe buckets
pub mod aggregator;
pub mod validator;
pub mod window;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregator::{aggregate, aggregate_minutes, CandleAggregator};
pub use validator::{CandleValidationError, CandleValidator};
pub use window::{evaluation_window, required_base_count, trim, MAX_LOOKBACK};

/// Base candle granularity every aggregation starts from
pub const BASE_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("unsupported aggregation interval: {0} minutes (expected 5, 15, 30 or 45)")]
    InvalidInterval(u32),
}

/// Aggregation intervals supported for trailing-stop evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CandleInterval {
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    FortyFiveMinutes,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 4] = [
        CandleInterval::FiveMinutes,
        CandleInterval::FifteenMinutes,
        CandleInterval::ThirtyMinutes,
        CandleInterval::FortyFiveMinutes,
    ];

    pub fn minutes(&self) -> u32 {
        match self {
            CandleInterval::FiveMinutes => 5,
            CandleInterval::FifteenMinutes => 15,
            CandleInterval::ThirtyMinutes => 30,
            CandleInterval::FortyFiveMinutes => 45,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.minutes() as i64 * BASE_INTERVAL_SECS
    }

    /// Epoch-aligned start of the bucket containing `unix_secs`
    pub fn bucket_start(&self, unix_secs: i64) -> i64 {
        let interval = self.seconds();
        unix_secs.div_euclid(interval) * interval
    }
}

impl TryFrom<u32> for CandleInterval {
    type Error = AggregationError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            5 => Ok(CandleInterval::FiveMinutes),
            15 => Ok(CandleInterval::FifteenMinutes),
            30 => Ok(CandleInterval::ThirtyMinutes),
            45 => Ok(CandleInterval::FortyFiveMinutes),
            other => Err(AggregationError::InvalidInterval(other)),
        }
    }
}

impl From<CandleInterval> for u32 {
    fn from(interval: CandleInterval) -> Self {
        interval.minutes()
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}
