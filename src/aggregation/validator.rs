use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::BASE_INTERVAL_SECS;
use crate::models::Candle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CandleValidationError {
    #[error("invalid {field} price for {symbol} at {at}: {value}")]
    NonPositivePrice {
        symbol: String,
        at: DateTime<Utc>,
        field: &'static str,
        value: Decimal,
    },
    #[error("negative volume for {symbol} at {at}: {value}")]
    NegativeVolume {
        symbol: String,
        at: DateTime<Utc>,
        value: Decimal,
    },
    #[error("OHLC out of range for {symbol} at {at}: {reason}")]
    OhlcRelationship {
        symbol: String,
        at: DateTime<Utc>,
        reason: String,
    },
    #[error("candle for {symbol} at {at} is not aligned to a minute boundary")]
    Misaligned { symbol: String, at: DateTime<Utc> },
    #[error("mixed symbols in one sequence: expected {expected}, found {found}")]
    MixedSymbols { expected: String, found: String },
    #[error("candles for {symbol} are not strictly ascending: {previous} followed by {next}")]
    NotAscending {
        symbol: String,
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

/// Sanity checks for 1-minute base candles before they are aggregated
///
/// The aggregator and evaluator assume well-formed input; callers that read
/// candles from storage run them through here first.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single base candle
    pub fn validate(&self, candle: &Candle) -> Result<(), CandleValidationError> {
        self.validate_prices(candle)?;
        self.validate_alignment(candle)?;
        self.validate_ohlc_relationship(candle)?;
        Ok(())
    }

    /// Validate every candle plus the ordering the aggregator relies on
    pub fn validate_sequence(&self, candles: &[Candle]) -> Result<(), CandleValidationError> {
        for candle in candles {
            self.validate(candle)?;
        }

        for pair in candles.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);

            if next.symbol != previous.symbol {
                return Err(CandleValidationError::MixedSymbols {
                    expected: previous.symbol.clone(),
                    found: next.symbol.clone(),
                });
            }

            if next.bucket_start <= previous.bucket_start {
                return Err(CandleValidationError::NotAscending {
                    symbol: next.symbol.clone(),
                    previous: previous.bucket_start,
                    next: next.bucket_start,
                });
            }
        }

        Ok(())
    }

    /// Split an unordered batch into per-symbol ascending sequences and
    /// validate each one
    ///
    /// Duplicate timestamps within a symbol are still rejected.
    pub fn validate_batch(
        &self,
        candles: Vec<Candle>,
    ) -> Result<BTreeMap<String, Vec<Candle>>, CandleValidationError> {
        let mut by_symbol: BTreeMap<String, Vec<Candle>> = BTreeMap::new();
        for candle in candles {
            by_symbol
                .entry(candle.symbol.clone())
                .or_default()
                .push(candle);
        }

        for sequence in by_symbol.values_mut() {
            sequence.sort_by_key(|c| c.bucket_start);
            self.validate_sequence(sequence)?;
        }

        Ok(by_symbol)
    }

    fn validate_prices(&self, candle: &Candle) -> Result<(), CandleValidationError> {
        let prices = [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ];

        for (field, value) in prices {
            if value <= Decimal::ZERO {
                return Err(CandleValidationError::NonPositivePrice {
                    symbol: candle.symbol.clone(),
                    at: candle.bucket_start,
                    field,
                    value,
                });
            }
        }

        // Zero volume is fine (quiet minutes)
        if candle.volume < Decimal::ZERO {
            return Err(CandleValidationError::NegativeVolume {
                symbol: candle.symbol.clone(),
                at: candle.bucket_start,
                value: candle.volume,
            });
        }

        Ok(())
    }

    fn validate_alignment(&self, candle: &Candle) -> Result<(), CandleValidationError> {
        let at = candle.bucket_start;
        if at.timestamp().rem_euclid(BASE_INTERVAL_SECS) != 0 || at.timestamp_subsec_nanos() != 0 {
            return Err(CandleValidationError::Misaligned {
                symbol: candle.symbol.clone(),
                at,
            });
        }
        Ok(())
    }

    fn validate_ohlc_relationship(&self, candle: &Candle) -> Result<(), CandleValidationError> {
        let reason = if candle.high < candle.low {
            Some(format!("high ({}) is less than low ({})", candle.high, candle.low))
        } else if candle.high < candle.open.max(candle.close) {
            Some(format!(
                "high ({}) is less than open/close ({}/{})",
                candle.high, candle.open, candle.close
            ))
        } else if candle.low > candle.open.min(candle.close) {
            Some(format!(
                "low ({}) is greater than open/close ({}/{})",
                candle.low, candle.open, candle.close
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CandleValidationError::OhlcRelationship {
                symbol: candle.symbol.clone(),
                at: candle.bucket_start,
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_valid_candle(unix_secs: i64) -> Candle {
        Candle {
            symbol: "ETHUSDT".to_string(),
            bucket_start: DateTime::from_timestamp(unix_secs, 0).unwrap(),
            open: dec!(100),
            high: dec!(102),
            low: dec!(99),
            close: dec!(101),
            volume: dec!(1000000),
        }
    }

    #[test]
    fn test_valid_candle() {
        let validator = CandleValidator::new();
        assert!(validator.validate(&make_valid_candle(60)).is_ok());
    }

    #[test]
    fn test_zero_volume_allowed() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle(60);
        candle.volume = Decimal::ZERO;
        assert!(validator.validate(&candle).is_ok());
    }

    #[test]
    fn test_non_positive_price() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle(60);
        candle.low = dec!(0);

        let err = validator.validate(&candle).unwrap_err();
        assert!(matches!(
            err,
            CandleValidationError::NonPositivePrice { field: "low", .. }
        ));
    }

    #[test]
    fn test_negative_volume() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle(60);
        candle.volume = dec!(-1);

        assert!(matches!(
            validator.validate(&candle),
            Err(CandleValidationError::NegativeVolume { .. })
        ));
    }

    #[test]
    fn test_high_below_close() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle(60);
        candle.close = dec!(103);

        let err = validator.validate(&candle).unwrap_err();
        assert!(matches!(err, CandleValidationError::OhlcRelationship { .. }));
        assert!(err.to_string().contains("high (102)"));
    }

    #[test]
    fn test_low_above_open() {
        let validator = CandleValidator::new();
        let mut candle = make_valid_candle(60);
        candle.low = dec!(100.5);

        assert!(matches!(
            validator.validate(&candle),
            Err(CandleValidationError::OhlcRelationship { .. })
        ));
    }

    #[test]
    fn test_misaligned_timestamp() {
        let validator = CandleValidator::new();
        let candle = make_valid_candle(90);

        assert!(matches!(
            validator.validate(&candle),
            Err(CandleValidationError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_sequence_ascending() {
        let validator = CandleValidator::new();
        let candles: Vec<Candle> = (0..5).map(|i| make_valid_candle(i * 60)).collect();
        assert!(validator.validate_sequence(&candles).is_ok());
        assert!(validator.validate_sequence(&[]).is_ok());
    }

    #[test]
    fn test_sequence_duplicate_timestamp() {
        let validator = CandleValidator::new();
        let candles = vec![make_valid_candle(60), make_valid_candle(60)];

        assert!(matches!(
            validator.validate_sequence(&candles),
            Err(CandleValidationError::NotAscending { .. })
        ));
    }

    #[test]
    fn test_sequence_descending() {
        let validator = CandleValidator::new();
        let candles = vec![make_valid_candle(120), make_valid_candle(60)];

        assert!(validator.validate_sequence(&candles).is_err());
    }

    #[test]
    fn test_sequence_mixed_symbols() {
        let validator = CandleValidator::new();
        let mut other = make_valid_candle(120);
        other.symbol = "BTCUSDT".to_string();
        let candles = vec![make_valid_candle(60), other];

        assert!(matches!(
            validator.validate_sequence(&candles),
            Err(CandleValidationError::MixedSymbols { .. })
        ));
    }

    #[test]
    fn test_batch_groups_and_sorts_by_symbol() {
        let validator = CandleValidator::new();
        let mut btc = make_valid_candle(60);
        btc.symbol = "BTCUSDT".to_string();
        let candles = vec![
            make_valid_candle(180),
            btc,
            make_valid_candle(60),
            make_valid_candle(120),
        ];

        let batch = validator.validate_batch(candles).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch["BTCUSDT"].len(), 1);
        let eth: Vec<i64> = batch["ETHUSDT"]
            .iter()
            .map(|c| c.bucket_start.timestamp())
            .collect();
        assert_eq!(eth, vec![60, 120, 180]);
    }

    #[test]
    fn test_batch_rejects_duplicates_and_bad_candles() {
        let validator = CandleValidator::new();

        let duplicates = vec![
            make_valid_candle(120),
            make_valid_candle(60),
            make_valid_candle(120),
        ];
        assert!(matches!(
            validator.validate_batch(duplicates),
            Err(CandleValidationError::NotAscending { .. })
        ));

        let mut broken = make_valid_candle(60);
        broken.volume = dec!(-5);
        assert!(validator.validate_batch(vec![broken]).is_err());
    }
}
