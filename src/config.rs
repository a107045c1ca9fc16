//! Monitor configuration
//!
//! Layered: built-in defaults, then an optional `stoptrail.toml` (or the
//! file given on the command line), then `STOPTRAIL_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::aggregation::{CandleInterval, MAX_LOOKBACK};
use crate::stop_loss::TrailingStop;
use crate::Result;

const DEFAULT_CONFIG_FILE: &str = "stoptrail";
const ENV_PREFIX: &str = "STOPTRAIL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Postgres connection URL
    pub database_url: String,

    /// Aggregation timeframe in minutes (5, 15, 30 or 45)
    pub interval_minutes: u32,

    /// Aggregated candles in the averaging window
    pub lookback: usize,

    /// Seconds between evaluation cycles
    pub poll_interval_secs: u64,

    /// `tracing_subscriber` env filter
    pub log_filter: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/stoptrail".to_string()),
            interval_minutes: 15,
            lookback: 3,
            poll_interval_secs: 60,
            log_filter: "stoptrail=info".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from defaults, file and environment
    ///
    /// # Arguments
    /// * `path` - Config file to read; when `None`, `stoptrail.toml` is used if present
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::with_name(path),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = Self::defaults()?
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        Self::from_builder(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();

        Ok(config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("interval_minutes", defaults.interval_minutes as i64)?
            .set_default("lookback", defaults.lookback as i64)?
            .set_default("poll_interval_secs", defaults.poll_interval_secs as i64)?
            .set_default("log_filter", defaults.log_filter)?)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        CandleInterval::try_from(self.interval_minutes)?;

        if self.lookback == 0 {
            return Err("lookback must be at least 1".into());
        }
        if self.lookback > MAX_LOOKBACK {
            return Err(format!("lookback must be at most {}", MAX_LOOKBACK).into());
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be at least 1".into());
        }

        Ok(())
    }

    /// Trailing-stop pipeline for these settings
    pub fn trailing_stop(&self) -> Result<TrailingStop> {
        Ok(TrailingStop::from_minutes(self.interval_minutes, self.lookback)?)
    }
}
