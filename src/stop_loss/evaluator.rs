//! Directional trailing stop-loss
//!
//! The stop follows the average extreme of the most recent candles (lows for
//! a long, highs for a short), clamped to the previous candle's extreme so it
//! never runs past a swing point that has not been confirmed yet. It only
//! moves when the previous candle agrees with the position's direction, and
//! only ever in the position's favor:
//! - Long: non-decreasing across successive evaluations
//! - Short: non-increasing across successive evaluations
//!
//! Pure functions of their inputs; ordering and symbol consistency of the
//! candles are the caller's responsibility.

use rust_decimal::Decimal;

use crate::models::{Candle, Side, StopLossUpdate};

/// Candidate stop-loss before the movement rule, if the trend gate allows one
///
/// Returns `None` with fewer than 2 candles, or when the previous candle
/// (second-to-last) is not bullish for a long / bearish for a short.
pub fn candidate_stop_loss(side: Side, candles: &[Candle], lookback: usize) -> Option<Decimal> {
    if candles.len() < 2 {
        return None;
    }

    let previous = &candles[candles.len() - 2];
    let window_len = lookback.clamp(1, candles.len());
    let window = &candles[candles.len() - window_len..];

    match side {
        Side::Long => {
            if !previous.is_bullish() {
                return None;
            }
            let average_low = average(window.iter().map(|c| c.low), window_len);
            Some(average_low.min(previous.low))
        }
        Side::Short => {
            if !previous.is_bearish() {
                return None;
            }
            let average_high = average(window.iter().map(|c| c.high), window_len);
            Some(average_high.max(previous.high))
        }
    }
}

/// Compute the next trailing stop-loss from ascending aggregated candles
///
/// Returns the current stop unchanged (and `moved = false`) when there is not
/// enough history, the trend gate fails, or the candidate would loosen the
/// stop.
pub fn compute_next_stop_loss(
    side: Side,
    current_stop_loss: Decimal,
    candles: &[Candle],
    lookback: usize,
) -> StopLossUpdate {
    let Some(candidate) = candidate_stop_loss(side, candles, lookback) else {
        tracing::debug!(
            "No {} stop candidate from {} candles (insufficient history or trend gate closed)",
            side,
            candles.len()
        );
        return StopLossUpdate::unchanged(current_stop_loss);
    };

    let favorable = match side {
        Side::Long => candidate > current_stop_loss,
        Side::Short => candidate < current_stop_loss,
    };

    if favorable {
        tracing::debug!("{} stop moves {} -> {}", side, current_stop_loss, candidate);
        StopLossUpdate::moved_to(candidate)
    } else {
        tracing::debug!(
            "{} stop holds at {} (candidate {} not favorable)",
            side,
            current_stop_loss,
            candidate
        );
        StopLossUpdate::unchanged(current_stop_loss)
    }
}

fn average(values: impl Iterator<Item = Decimal>, count: usize) -> Decimal {
    values.sum::<Decimal>() / Decimal::from(count)
}
