use chrono::Duration;

use super::{AggregationError, CandleInterval};
use crate::models::Candle;

/// Aggregates ascending 1-minute candles into epoch-aligned buckets
///
/// Supports the fixed trailing-stop timeframes only:
/// - 5 and 15 minute candles for fast-moving positions
/// - 30 and 45 minute candles for swing positions
///
/// Bucket boundaries follow absolute Unix time, so a 45-minute bucket does
/// not necessarily start at the top of an hour.
#[derive(Debug, Clone, Copy)]
pub struct CandleAggregator {
    interval: CandleInterval,
}

/// Streaming fold state: at most one open bucket at a time
#[derive(Debug)]
enum BucketState {
    NoBucket,
    Accumulating(Candle),
}

impl BucketState {
    /// Feed one base candle, returning the next state and the bucket it closed (if any)
    fn advance(self, candle: &Candle, interval: CandleInterval) -> (BucketState, Option<Candle>) {
        let bucket_start = interval.bucket_start(candle.bucket_start.timestamp());

        match self {
            BucketState::Accumulating(bucket) if bucket.bucket_start.timestamp() == bucket_start => {
                (BucketState::Accumulating(merge(bucket, candle)), None)
            }
            BucketState::Accumulating(finished) => (
                BucketState::Accumulating(open_bucket(candle, bucket_start)),
                Some(finished),
            ),
            BucketState::NoBucket => (
                BucketState::Accumulating(open_bucket(candle, bucket_start)),
                None,
            ),
        }
    }
}

impl CandleAggregator {
    pub fn new(interval: CandleInterval) -> Self {
        Self { interval }
    }

    /// Create an aggregator from a raw minute count
    ///
    /// # Errors
    /// `InvalidInterval` unless `minutes` is 5, 15, 30 or 45
    pub fn from_minutes(minutes: u32) -> Result<Self, AggregationError> {
        Ok(Self::new(CandleInterval::try_from(minutes)?))
    }

    pub fn interval(&self) -> CandleInterval {
        self.interval
    }

    /// Fold ascending base candles into one candle per bucket
    ///
    /// The trailing bucket is always emitted, even when it holds fewer than a
    /// full interval of base candles. Missing minutes are tolerated; the
    /// affected bucket simply has fewer constituents.
    pub fn aggregate(&self, candles: &[Candle]) -> Vec<Candle> {
        let per_bucket = self.interval.minutes() as usize;
        let mut aggregated = Vec::with_capacity(candles.len() / per_bucket + 1);
        let mut state = BucketState::NoBucket;

        for candle in candles {
            let (next, finished) = state.advance(candle, self.interval);
            if let Some(bucket) = finished {
                aggregated.push(bucket);
            }
            state = next;
        }

        if let BucketState::Accumulating(last) = state {
            aggregated.push(last);
        }

        tracing::trace!(
            "Aggregated {} base candles into {} {} candles",
            candles.len(),
            aggregated.len(),
            self.interval
        );

        aggregated
    }
}

/// Aggregate ascending 1-minute candles at a supported interval
pub fn aggregate(candles: &[Candle], interval: CandleInterval) -> Vec<Candle> {
    CandleAggregator::new(interval).aggregate(candles)
}

/// Aggregate ascending 1-minute candles at an interval given in minutes
///
/// # Errors
/// `InvalidInterval` unless `minutes` is 5, 15, 30 or 45; no partial result
/// is produced.
pub fn aggregate_minutes(candles: &[Candle], minutes: u32) -> Result<Vec<Candle>, AggregationError> {
    Ok(CandleAggregator::from_minutes(minutes)?.aggregate(candles))
}

/// Start a new bucket seeded from its first base candle
fn open_bucket(candle: &Candle, bucket_start: i64) -> Candle {
    // Step back to the boundary, dropping any sub-second component
    let offset = Duration::seconds(candle.bucket_start.timestamp() - bucket_start)
        + Duration::nanoseconds(candle.bucket_start.timestamp_subsec_nanos() as i64);

    Candle {
        symbol: candle.symbol.clone(),
        bucket_start: candle.bucket_start - offset,
        open: candle.open,
        high: candle.high,
        low: candle.low,
        close: candle.close,
        volume: candle.volume,
    }
}

fn merge(bucket: Candle, candle: &Candle) -> Candle {
    Candle {
        high: bucket.high.max(candle.high),
        low: bucket.low.min(candle.low),
        close: candle.close,
        volume: bucket.volume + candle.volume,
        ..bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn ts(unix_secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(unix_secs, 0).unwrap()
    }

    fn minute_candle(
        unix_secs: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            bucket_start: ts(unix_secs),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn flat_minutes(start: i64, count: i64, price: Decimal) -> Vec<Candle> {
        (0..count)
            .map(|i| minute_candle(start + i * 60, price, price, price, price, dec!(1)))
            .collect()
    }

    #[test]
    fn test_aggregate_empty_input() {
        let aggregated = aggregate(&[], CandleInterval::FiveMinutes);
        assert!(aggregated.is_empty());
    }

    #[test]
    fn test_aggregate_rejects_unsupported_interval() {
        let candles = flat_minutes(0, 10, dec!(100));

        for minutes in [1, 10, 60] {
            assert_eq!(
                aggregate_minutes(&candles, minutes),
                Err(AggregationError::InvalidInterval(minutes))
            );
        }
    }

    #[test]
    fn test_aggregate_single_candle() {
        let candles = vec![minute_candle(120, dec!(100), dec!(101), dec!(99), dec!(100.5), dec!(7))];

        let aggregated = aggregate(&candles, CandleInterval::FiveMinutes);

        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].bucket_start, ts(0));
        assert_eq!(aggregated[0].open, dec!(100));
        assert_eq!(aggregated[0].close, dec!(100.5));
        assert_eq!(aggregated[0].volume, dec!(7));
    }

    #[test]
    fn test_aggregate_ohlcv_within_bucket() {
        let candles = vec![
            minute_candle(0, dec!(100), dec!(101), dec!(99.5), dec!(100.5), dec!(10)), // Open
            minute_candle(60, dec!(100.5), dec!(103), dec!(100), dec!(102), dec!(20)), // High
            minute_candle(120, dec!(102), dec!(102.5), dec!(98), dec!(99), dec!(5)),   // Low
            minute_candle(180, dec!(99), dec!(100), dec!(98.5), dec!(99.5), dec!(1.5)),
            minute_candle(240, dec!(99.5), dec!(101), dec!(99), dec!(100.75), dec!(3)), // Close
        ];

        let aggregated = aggregate(&candles, CandleInterval::FiveMinutes);

        assert_eq!(aggregated.len(), 1);
        let bucket = &aggregated[0];
        assert_eq!(bucket.symbol, "BTCUSDT");
        assert_eq!(bucket.bucket_start, ts(0));
        assert_eq!(bucket.open, dec!(100));
        assert_eq!(bucket.high, dec!(103));
        assert_eq!(bucket.low, dec!(98));
        assert_eq!(bucket.close, dec!(100.75));
        assert_eq!(bucket.volume, dec!(39.5));
    }

    #[test]
    fn test_aggregate_multiple_buckets_ascending() {
        let candles = flat_minutes(0, 15, dec!(100));

        let aggregated = aggregate(&candles, CandleInterval::FiveMinutes);

        assert_eq!(aggregated.len(), 3);
        for (i, bucket) in aggregated.iter().enumerate() {
            assert_eq!(bucket.bucket_start, ts(i as i64 * 300));
            assert_eq!(bucket.volume, dec!(5));
        }
    }

    #[test]
    fn test_incomplete_last_bucket_is_emitted() {
        // 7 minutes: one full 5m bucket plus 2 minutes of the next
        let candles = flat_minutes(0, 7, dec!(100));

        let aggregated = aggregate(&candles, CandleInterval::FiveMinutes);

        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[1].bucket_start, ts(300));
        assert_eq!(aggregated[1].volume, dec!(2));
    }

    #[test]
    fn test_partial_first_bucket_aligns_to_boundary() {
        // Starts at minute 3 of a 15m bucket
        let candles = flat_minutes(180, 14, dec!(100));

        let aggregated = aggregate(&candles, CandleInterval::FifteenMinutes);

        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].bucket_start, ts(0));
        assert_eq!(aggregated[0].volume, dec!(12));
        assert_eq!(aggregated[1].bucket_start, ts(900));
        assert_eq!(aggregated[1].volume, dec!(2));
    }

    #[test]
    fn test_gaps_do_not_fail() {
        let candles = vec![
            minute_candle(0, dec!(100), dec!(101), dec!(99), dec!(100), dec!(1)),
            // Minutes 1-4 missing, and the whole second bucket
            minute_candle(600, dec!(102), dec!(104), dec!(101), dec!(103), dec!(2)),
            minute_candle(720, dec!(103), dec!(105), dec!(102), dec!(104), dec!(3)),
        ];

        let aggregated = aggregate(&candles, CandleInterval::FiveMinutes);

        // No synthetic candle for the empty 300s bucket
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].bucket_start, ts(0));
        assert_eq!(aggregated[1].bucket_start, ts(600));
        assert_eq!(aggregated[1].open, dec!(102));
        assert_eq!(aggregated[1].close, dec!(104));
        assert_eq!(aggregated[1].volume, dec!(5));
    }

    #[test]
    fn test_forty_five_minute_buckets_follow_epoch() {
        // 1h of data starting at 01:00 UTC; 45m boundaries are 00:45, 01:30, 02:15
        let candles = flat_minutes(3600, 60, dec!(50));

        let aggregated = aggregate(&candles, CandleInterval::FortyFiveMinutes);

        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].bucket_start, ts(2700));
        assert_eq!(aggregated[0].volume, dec!(30)); // 01:00..01:29
        assert_eq!(aggregated[1].bucket_start, ts(5400));
        assert_eq!(aggregated[1].volume, dec!(30)); // 01:30..01:59
    }

    #[test]
    fn test_missing_minutes_only_shift_open_and_close() {
        let full = vec![
            minute_candle(0, dec!(10), dec!(11), dec!(9), dec!(10.5), dec!(1)),
            minute_candle(60, dec!(10.5), dec!(14), dec!(10), dec!(13), dec!(1)),
            minute_candle(120, dec!(13), dec!(13.5), dec!(8), dec!(9), dec!(1)),
            minute_candle(180, dec!(9), dec!(10), dec!(8.5), dec!(9.5), dec!(1)),
        ];
        // Drop the first and last minute; the extremes stay in the bucket
        let sparse = full[1..3].to_vec();

        let a = &aggregate(&full, CandleInterval::FiveMinutes)[0];
        let b = &aggregate(&sparse, CandleInterval::FiveMinutes)[0];

        assert_eq!(a.bucket_start, b.bucket_start);
        assert_eq!(a.high, b.high);
        assert_eq!(a.low, b.low);
        assert_eq!(b.open, dec!(10.5));
        assert_eq!(b.close, dec!(9));
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let candles: Vec<Candle> = (0..47)
            .map(|i| {
                let base = dec!(100) + Decimal::from(i % 7);
                minute_candle(i * 60, base, base + dec!(2), base - dec!(1), base + dec!(0.5), dec!(3))
            })
            .collect();

        for interval in CandleInterval::ALL {
            let once = aggregate(&candles, interval);
            let twice = aggregate(&once, interval);
            assert_eq!(once, twice, "re-aggregating at {} changed the output", interval);
        }
    }

    #[test]
    fn test_sub_second_timestamps_align_to_bucket() {
        let mut candle = minute_candle(61, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1));
        candle.bucket_start = DateTime::from_timestamp(61, 500_000_000).unwrap();

        let aggregated = aggregate(&[candle], CandleInterval::FiveMinutes);

        assert_eq!(aggregated[0].bucket_start, ts(0));
    }

    #[test]
    fn test_from_minutes() {
        let aggregator = CandleAggregator::from_minutes(30).unwrap();
        assert_eq!(aggregator.interval(), CandleInterval::ThirtyMinutes);
        assert!(CandleAggregator::from_minutes(20).is_err());
    }
}
