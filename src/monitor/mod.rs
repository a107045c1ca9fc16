// Minute-interval trailing stop monitor over stored positions
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::aggregation::CandleValidator;
use crate::db::CandleStore;
use crate::models::{Side, StopLossUpdate, TrackedPosition};
use crate::stop_loss::TrailingStop;
use crate::Result;

/// Outcome of one pass over every open position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub evaluated: usize,
    pub moved: usize,
    pub failed: usize,
}

/// Result of evaluating one symbol, suitable for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub symbol: String,
    pub side: Side,
    pub at: DateTime<Utc>,
    pub base_candles: usize,
    pub previous_stop_loss: Decimal,
    pub stop_loss: Decimal,
    pub moved: bool,
}

impl Evaluation {
    pub fn update(&self) -> StopLossUpdate {
        StopLossUpdate {
            stop_loss: self.stop_loss,
            moved: self.moved,
        }
    }
}

/// Re-evaluates every open position's stop-loss once per cycle
///
/// Positions are processed one after another, so a single position is never
/// evaluated twice concurrently. A failure on one position is logged and the
/// cycle moves on.
pub struct StopLossMonitor<S> {
    store: S,
    trailing: TrailingStop,
    validator: CandleValidator,
    poll_interval: Duration,
}

impl<S: CandleStore> StopLossMonitor<S> {
    pub fn new(store: S, trailing: TrailingStop, poll_interval: Duration) -> Self {
        Self {
            store,
            trailing,
            validator: CandleValidator::new(),
            poll_interval,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn trailing(&self) -> &TrailingStop {
        &self.trailing
    }

    /// Evaluate a stop-loss for `symbol` at `at` without persisting anything
    pub async fn evaluate_symbol(
        &self,
        symbol: &str,
        side: Side,
        current_stop_loss: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Evaluation> {
        let limit = self.trailing.base_candles_needed();
        let candles = self.store.load_candles_until(symbol, at, limit).await?;
        self.validator.validate_sequence(&candles)?;

        let update = self.trailing.evaluate(side, current_stop_loss, &candles);

        Ok(Evaluation {
            symbol: symbol.to_string(),
            side,
            at,
            base_candles: candles.len(),
            previous_stop_loss: current_stop_loss,
            stop_loss: update.stop_loss,
            moved: update.moved,
        })
    }

    /// Evaluate one position and persist its stop-loss if it moved
    pub async fn evaluate_position(
        &self,
        position: &TrackedPosition,
        at: DateTime<Utc>,
    ) -> Result<StopLossUpdate> {
        let evaluation = self
            .evaluate_symbol(&position.symbol, position.side, position.stop_loss, at)
            .await?;

        if evaluation.moved {
            self.store
                .update_stop_loss(position.id, evaluation.stop_loss)
                .await?;

            tracing::info!(
                "📈 {} {} stop-loss {} -> {} ({} candles)",
                position.symbol,
                position.side,
                position.stop_loss,
                evaluation.stop_loss,
                self.trailing.interval()
            );
        } else {
            tracing::debug!(
                "{} {} stop-loss holds at {} ({} base candles)",
                position.symbol,
                position.side,
                position.stop_loss,
                evaluation.base_candles
            );
        }

        Ok(evaluation.update())
    }

    /// Evaluate every open position once
    pub async fn run_cycle(&self, at: DateTime<Utc>) -> Result<CycleSummary> {
        let positions = self.store.load_open_positions().await?;
        let mut summary = CycleSummary::default();

        for position in &positions {
            summary.evaluated += 1;

            match self.evaluate_position(position, at).await {
                Ok(update) if update.moved => summary.moved += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        "Skipping {} position {}: {}",
                        position.symbol,
                        position.id,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Cycle at {}: {} evaluated, {} moved, {} failed",
            at.format("%H:%M:%S"),
            summary.evaluated,
            summary.moved,
            summary.failed
        );

        Ok(summary)
    }

    /// Run cycles every poll interval, aligned to the next minute boundary,
    /// until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval_at(next_minute_boundary(), self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle(Utc::now()).await {
                        tracing::error!("Evaluation cycle failed: {}", e);
                    }
                }
            }
        }
    }
}

/// When the next minute boundary (XX:XX:00) will occur
fn next_minute_boundary() -> Instant {
    let now = Utc::now();
    let seconds_until_next = 60 - now.second() as u64;
    Instant::now() + Duration::from_secs(seconds_until_next)
}
