//! Configuration management for ForecastBot
//!
//! Built-in defaults, optional `config/default` + `config/local` files (or an
//! explicit `--config` file), then `FORECAST__*` environment variables via .env.
//! The legacy `SYMBOLS` comma list overrides `bot.symbols`.

mod types;

pub use types::*;

use crate::types::Horizon;
use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Legacy symbol-list override
pub const SYMBOLS_ENV: &str = "SYMBOLS";

pub const DEFAULT_SYMBOLS: [&str; 10] = [
    "BTCUSDT", "ETHUSDT", "XRPUSDT", "BNBUSDT", "SOLUSDT", "DOGEUSDT", "ADAUSDT", "LTCUSDT",
    "SHIBUSDT", "PUMPUSDT",
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub persistence: PersistenceConfig,
    pub oracle: OracleConfig,
    pub policy: PolicyConfig,
    pub pacing: PacingConfig,
    pub summary: SummaryConfig,
    pub training: TrainingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Pair symbols to forecast (e.g. BTCUSDT)
    pub symbols: Vec<String>,
    /// Horizons in minutes (15, 60)
    pub horizons: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Root of the record, model and summary files
    pub data_dir: String,
    /// Store files are rotated past this many lines
    pub rotate_max_lines: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub binance_url: String,
    pub cryptocompare_url: String,
    /// Use CryptoCompare when Binance fails
    pub cryptocompare_enabled: bool,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per request (HTTP 429 and transport errors)
    pub max_retries: u32,
    /// 1-minute bars fetched per forecast; the last, still forming, is dropped
    pub series_len: usize,
    /// Window after due time in which a resolution close is accepted
    pub close_tolerance_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Pause after each symbol
    pub symbol_delay_ms: u64,
    /// Pause after a failed symbol
    pub error_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    /// Trailing windows in hours
    pub windows_hours: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// JSON log lines instead of the human format
    pub json: bool,
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

/// Builder preloaded with every default
pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    let builder = Config::builder()
        // Bot defaults
        .set_default("bot.symbols", DEFAULT_SYMBOLS.to_vec())?
        .set_default("bot.horizons", vec![15_i64, 60])?
        // Persistence defaults
        .set_default("persistence.data_dir", "./data")?
        .set_default("persistence.rotate_max_lines", 20_000)?
        // Oracle defaults
        .set_default("oracle.binance_url", "https://api.binance.com")?
        .set_default("oracle.cryptocompare_url", "https://min-api.cryptocompare.com")?
        .set_default("oracle.cryptocompare_enabled", true)?
        .set_default("oracle.timeout_secs", 10)?
        .set_default("oracle.max_retries", 3)?
        .set_default("oracle.series_len", 61)?
        .set_default("oracle.close_tolerance_ms", 120_000)?
        // Policy defaults
        .set_default("policy.min_confidence", 0.62)?
        .set_default("policy.min_range_hi", 0.30)?
        // Pacing defaults
        .set_default("pacing.symbol_delay_ms", 150)?
        .set_default("pacing.error_delay_ms", 250)?
        // Summary defaults
        .set_default("summary.windows_hours", vec![24_i64, 168, 720])?
        // Training defaults
        .set_default("training.days", 30)?
        .set_default("training.min_samples", 200)?
        .set_default("training.learning_rate", 0.05)?
        .set_default("training.epochs", 60)?
        .set_default("training.l2", 0.001)?
        // Log defaults
        .set_default("log.json", false)?
        .set_default("log.level", "info")?;
    Ok(builder)
}

/// Parse a comma list, dropping blanks
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = defaults()?;
        builder = match path {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false)),
        };

        let config = builder
            // Override with environment variables (FORECAST__*)
            .add_source(
                Environment::with_prefix("FORECAST")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.symbols")
                    .with_list_parse_key("bot.horizons")
                    .with_list_parse_key("summary.windows_hours")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if let Ok(raw) = std::env::var(SYMBOLS_ENV) {
            app_config.bot.symbols = parse_symbol_list(&raw);
        }

        app_config.validate()?;
        Ok(app_config)
    }

    /// An empty symbol list or an unknown horizon is fatal
    pub fn validate(&self) -> Result<()> {
        if self.bot.symbols.is_empty() {
            bail!("No symbols configured (bot.symbols / {})", SYMBOLS_ENV);
        }
        if self.bot.horizons.is_empty() {
            bail!("No horizons configured (bot.horizons)");
        }
        for &minutes in &self.bot.horizons {
            if Horizon::from_minutes(minutes).is_none() {
                bail!("Unsupported horizon {}m (supported: 15, 60)", minutes);
            }
        }
        if !(0.0..=1.0).contains(&self.policy.min_confidence) {
            bail!("policy.min_confidence must be within [0, 1]");
        }
        if self.oracle.series_len < crate::ml_engine::MIN_SERIES_LEN + 1 {
            bail!(
                "oracle.series_len must be at least {}",
                crate::ml_engine::MIN_SERIES_LEN + 1
            );
        }
        Ok(())
    }

    /// Configured horizons, deduplicated in canonical order
    pub fn horizons(&self) -> Vec<Horizon> {
        Horizon::ALL
            .into_iter()
            .filter(|h| self.bot.horizons.contains(&h.minutes()))
            .collect()
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "symbols={} horizons={:?} data_dir={} min_conf={:.2} min_range_hi={:.2} windows={:?}",
            self.bot.symbols.len(),
            self.bot.horizons,
            self.persistence.data_dir,
            self.policy.min_confidence,
            self.policy.min_range_hi,
            self.summary.windows_hours
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
