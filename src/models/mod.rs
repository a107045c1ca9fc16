use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// OHLCV candlestick for one time bucket of one symbol
///
/// `bucket_start` is the inclusive UTC start of the interval. Prices and
/// volume are exact decimals so repeated aggregation never drifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub bucket_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Close strictly above open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close strictly below open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profits as price rises; stop trails below price
    Long,
    /// Profits as price falls; stop trails above price
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown position side: {0:?} (expected \"long\" or \"short\")")]
pub struct ParseSideError(pub String);

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            _ => Err(ParseSideError(s.to_string())),
        }
    }
}

/// Result of one stop-loss evaluation
///
/// The caller owns the stop-loss value; the engine only ever hands back a new
/// one. `moved` is true when `stop_loss` differs from what was passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLossUpdate {
    pub stop_loss: Decimal,
    pub moved: bool,
}

impl StopLossUpdate {
    pub fn unchanged(stop_loss: Decimal) -> Self {
        Self {
            stop_loss,
            moved: false,
        }
    }

    pub fn moved_to(stop_loss: Decimal) -> Self {
        Self {
            stop_loss,
            moved: true,
        }
    }
}

/// Open position whose stop-loss is being trailed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub stop_loss: Decimal,
}
