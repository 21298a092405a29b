//! ForecastBot CLI
//!
//! Usage: forecastbot [--config PATH] <predict|evaluate|summarize|run|train|export>

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use forecastbot::config::AppConfig;
use forecastbot::pipeline::Pipeline;
use forecastbot::schedule::due_configured;
use forecastbot::types::Horizon;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forecastbot")]
#[command(version)]
#[command(about = "Directional 15m/1h forecasts with outcome tracking and hit-rate summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to config/default + config/local)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record forecasts for horizons whose boundary is now
    Predict {
        /// Ignore the clock boundary and forecast every configured horizon
        #[arg(short, long)]
        force: bool,
        /// Only this horizon (15 or 60)
        #[arg(long)]
        horizon: Option<u32>,
    },
    /// Resolve due Pending forecasts
    Evaluate,
    /// Write per-symbol and global hit-rate summaries
    Summarize,
    /// Predict, evaluate, then summarize
    Run {
        #[arg(short, long)]
        force: bool,
    },
    /// Train per-symbol/per-horizon models from 1-minute history
    Train {
        /// Days of history (defaults to training.days)
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Export every record to one CSV file
    Export {
        #[arg(short, long, default_value = "forecasts.csv")]
        out: PathBuf,
    },
}

fn init_logging(json: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Horizons for a predict run: clock gate, configured set, optional single horizon
fn predict_horizons(config: &AppConfig, force: bool, only: Option<u32>) -> Result<Vec<Horizon>> {
    let mut horizons = due_configured(Utc::now(), force, &config.horizons());
    if let Some(minutes) = only {
        let Some(wanted) = Horizon::from_minutes(minutes) else {
            bail!("Unsupported horizon {}m (supported: 15, 60)", minutes);
        };
        horizons.retain(|h| *h == wanted);
    }
    Ok(horizons)
}

async fn predict(pipeline: &Pipeline, force: bool, only: Option<u32>) -> Result<()> {
    let horizons = predict_horizons(pipeline.config(), force, only)?;
    if horizons.is_empty() {
        info!(now = %Utc::now().to_rfc3339(), "⏭️ Not at a horizon boundary, skipping");
        return Ok(());
    }
    info!(horizons = ?horizons, force, "🚀 Predict run starting");
    pipeline.predict(&horizons, Utc::now().timestamp_millis()).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.json || config.log.json, &config.log.level);
    info!("⚙️ {}", config);

    let pipeline = Pipeline::from_config(config).context("Failed to initialise pipeline")?;

    match cli.command {
        Commands::Predict { force, horizon } => predict(&pipeline, force, horizon).await?,
        Commands::Evaluate => {
            pipeline.evaluate(Utc::now().timestamp_millis()).await;
        }
        Commands::Summarize => {
            pipeline.summarize(Utc::now().timestamp_millis())?;
        }
        Commands::Run { force } => {
            predict(&pipeline, force, None).await?;
            pipeline.evaluate(Utc::now().timestamp_millis()).await;
            pipeline.summarize(Utc::now().timestamp_millis())?;
        }
        Commands::Train { days } => {
            let days = days.unwrap_or(pipeline.config().training.days);
            let report = pipeline.train(days, Utc::now().timestamp_millis()).await;
            info!(
                trained = report.trained,
                skipped = report.skipped,
                failed = report.failed,
                "🎓 Training complete"
            );
        }
        Commands::Export { out } => {
            let rows = pipeline.export(&out)?;
            info!(rows, file = %out.display(), "📝 Export complete");
        }
    }

    Ok(())
}
