use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use super::CandleStore;
use crate::models::{Candle, Side, TrackedPosition};
use crate::Result;

/// Postgres persistence for 1-minute candles and trailed positions
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Connect to Postgres and run migrations
    ///
    /// # Arguments
    /// * `database_url` - Postgres connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres at {}", database_url);

        Ok(Self { pool })
    }

    /// Upsert 1-minute candles, keyed by `(symbol, bucket_start)`
    pub async fn save_candles(&self, candles: &[Candle]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO candles (symbol, bucket_start, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (symbol, bucket_start) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.bucket_start)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!("Saved {} candles to Postgres", candles.len());

        Ok(())
    }

    /// Start trailing a new position
    pub async fn open_position(&self, symbol: &str, side: Side, stop_loss: Decimal) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO positions (id, symbol, side, stop_loss, status)
            VALUES ($1, $2, $3, $4, 'open')
            "#,
        )
        .bind(id)
        .bind(symbol)
        .bind(side.as_str())
        .bind(stop_loss)
        .execute(&self.pool)
        .await?;

        tracing::info!("Opened {} position {} for {} (stop {})", side, id, symbol, stop_loss);

        Ok(id)
    }

    /// Stop trailing a position
    pub async fn close_position(&self, position_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE positions
            SET status = 'closed', updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(position_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("No open position {}", position_id).into());
        }

        tracing::info!("Closed position {}", position_id);

        Ok(())
    }

    /// Delete all candles and positions (testing only)
    #[cfg(test)]
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM candles").execute(&self.pool).await?;
        sqlx::query("DELETE FROM positions").execute(&self.pool).await?;
        Ok(())
    }
}

impl CandleStore for PostgresPersistence {
    async fn load_candles_until(
        &self,
        symbol: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, bucket_start, open, high, low, close, volume
            FROM candles
            WHERE symbol = $1 AND bucket_start <= $2
            ORDER BY bucket_start DESC
            LIMIT $3
            "#,
        )
        .bind(symbol)
        .bind(until)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        // Rows come back newest first
        let candles: Vec<Candle> = rows
            .iter()
            .rev()
            .map(|row| Candle {
                symbol: row.get("symbol"),
                bucket_start: row.get("bucket_start"),
                open: row.get("open"),
                high: row.get("high"),
                low: row.get("low"),
                close: row.get("close"),
                volume: row.get("volume"),
            })
            .collect();

        tracing::debug!(
            "Loaded {} candles for {} up to {}",
            candles.len(),
            symbol,
            until
        );

        Ok(candles)
    }

    async fn load_open_positions(&self) -> Result<Vec<TrackedPosition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, side, stop_loss
            FROM positions
            WHERE status = 'open'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut positions = Vec::with_capacity(rows.len());

        for row in rows {
            let side_str: String = row.get("side");

            positions.push(TrackedPosition {
                id: row.get("id"),
                symbol: row.get("symbol"),
                side: side_str.parse()?,
                stop_loss: row.get("stop_loss"),
            });
        }

        tracing::debug!("Loaded {} open positions from Postgres", positions.len());

        Ok(positions)
    }

    async fn update_stop_loss(&self, position_id: Uuid, stop_loss: Decimal) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE positions
            SET stop_loss = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(position_id)
        .bind(stop_loss)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("No open position {}", position_id).into());
        }

        tracing::debug!("Updated stop-loss for {} to {}", position_id, stop_loss);

        Ok(())
    }
}
