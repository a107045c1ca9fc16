use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use stoptrail::aggregation::CandleValidator;
use stoptrail::config::MonitorConfig;
use stoptrail::db::{CandleStore, PostgresPersistence};
use stoptrail::monitor::StopLossMonitor;
use stoptrail::models::{Candle, Side};
use stoptrail::Result;
use tokio::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stoptrail", version, about = "Directional trailing stop-loss monitor")]
struct Cli {
    /// Config file (defaults to ./stoptrail.toml when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Aggregation interval in minutes (5, 15, 30 or 45)
    #[arg(long, global = true)]
    interval: Option<u32>,

    /// Aggregated candles in the averaging window
    #[arg(long, global = true)]
    lookback: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trail every open position's stop-loss once per poll interval
    Monitor,

    /// Evaluate one stop-loss and print the result as JSON (nothing is persisted)
    Evaluate {
        #[arg(long)]
        symbol: String,

        /// long or short
        #[arg(long)]
        side: Side,

        #[arg(long)]
        stop_loss: Decimal,

        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List open positions and their current stop-loss
    Positions,

    /// Start trailing a position
    Open {
        #[arg(long)]
        symbol: String,

        /// long or short
        #[arg(long)]
        side: Side,

        /// Initial stop-loss
        #[arg(long)]
        stop_loss: Decimal,
    },

    /// Stop trailing a position
    Close {
        #[arg(long)]
        id: Uuid,
    },

    /// Load 1-minute candles from a JSON array file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = MonitorConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(interval) = cli.interval {
        config.interval_minutes = interval;
    }
    if let Some(lookback) = cli.lookback {
        config.lookback = lookback;
    }
    config.validate()?;

    setup_logging(&config.log_filter);

    let trailing = config.trailing_stop()?;
    let postgres = PostgresPersistence::new(&config.database_url).await?;
    let monitor = StopLossMonitor::new(
        postgres,
        trailing,
        Duration::from_secs(config.poll_interval_secs),
    );

    match cli.command {
        Command::Monitor => {
            tracing::info!("🚀 stoptrail monitor starting");
            tracing::info!("  Interval: {}", trailing.interval());
            tracing::info!("  Lookback: {} candles", trailing.lookback());
            tracing::info!("  Base candles per evaluation: {}", trailing.base_candles_needed());
            tracing::info!("  Poll interval: {}s", config.poll_interval_secs);

            monitor
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    }
                })
                .await;

            tracing::info!("👋 stoptrail stopped");
        }
        Command::Evaluate {
            symbol,
            side,
            stop_loss,
            at,
        } => {
            let at = at.unwrap_or_else(Utc::now);
            let evaluation = monitor.evaluate_symbol(&symbol, side, stop_loss, at).await?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Command::Positions => {
            let positions = monitor.store().load_open_positions().await?;
            println!("{:<38} {:<12} {:<6} {:>14}", "ID", "Symbol", "Side", "Stop-loss");
            println!("{}", "─".repeat(74));
            for position in positions {
                println!(
                    "{:<38} {:<12} {:<6} {:>14}",
                    position.id.to_string(),
                    position.symbol,
                    position.side.as_str(),
                    position.stop_loss.to_string()
                );
            }
        }
        Command::Open {
            symbol,
            side,
            stop_loss,
        } => {
            let id = monitor.store().open_position(&symbol, side, stop_loss).await?;
            println!("{}", id);
        }
        Command::Close { id } => {
            monitor.store().close_position(id).await?;
        }
        Command::Import { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let candles: Vec<Candle> = serde_json::from_str(&contents)
                .with_context(|| format!("Invalid candle JSON in {}", file.display()))?;
            let batch = CandleValidator::new().validate_batch(candles)?;
            for (symbol, candles) in &batch {
                monitor.store().save_candles(candles).await?;
                tracing::info!(
                    "Imported {} {} candles from {}",
                    candles.len(),
                    symbol,
                    file.display()
                );
            }
        }
    }

    Ok(())
}

fn setup_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}
