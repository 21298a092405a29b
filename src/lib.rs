//! ForecastBot Library
//!
//! Directional 15m/1h forecasts per symbol, outcome resolution against
//! observed prices, and rolling-window hit-rate statistics.

pub mod config;
pub mod error;
pub mod ml_engine;
pub mod oracle;
pub mod persistence;
pub mod pipeline;
pub mod resolution;
pub mod schedule;
pub mod summary;
pub mod types;

pub use error::{ForecastError, Result};
