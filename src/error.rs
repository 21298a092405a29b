//! Domain error taxonomy
//!
//! Every variant is recoverable at symbol or record granularity; callers log
//! and move on instead of aborting a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// No usable price data (short series, empty window, bad quote)
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Trained model file exists but cannot be used
    #[error("Model load failed for {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// A persisted line that does not parse as a forecast record
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Transport or HTTP failure from a market-data source
    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<reqwest::Error> for ForecastError {
    fn from(e: reqwest::Error) -> Self {
        ForecastError::Network(e.to_string())
    }
}

impl ForecastError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        ForecastError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn model_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
