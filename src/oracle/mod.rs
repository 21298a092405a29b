//! Oracle module - REST market data for forecasting and resolution
//!
//! Fetches closed 1-minute bars from Binance with CryptoCompare as a fallback,
//! plus point-in-time closes and spot quotes for outcome resolution.

pub mod sources;

pub use sources::{BinanceClient, CryptoCompareClient};

use crate::config::OracleConfig;
use crate::error::{ForecastError, Result};
use crate::ml_engine::{OhlcBar, MIN_SERIES_LEN};
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Bar size requested from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarInterval {
    Minute1,
    Hour1,
}

impl BarInterval {
    pub fn duration_ms(&self) -> i64 {
        match self {
            BarInterval::Minute1 => 60_000,
            BarInterval::Hour1 => 3_600_000,
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarInterval::Minute1 => write!(f, "1m"),
            BarInterval::Hour1 => write!(f, "1h"),
        }
    }
}

/// Market-data client contract
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    /// Most recent `count` bars, oldest first. The last one may still be forming.
    async fn fetch_series(
        &self,
        symbol: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<OhlcBar>>;

    /// Close of the first 1-minute bar opening inside `[start_ms, end_ms]`
    async fn fetch_close_in_window(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Option<f64>>;

    async fn fetch_spot(&self, symbol: &str) -> Result<Option<f64>>;

    /// 1-minute history over `[start_ms, end_ms]`, oldest first
    async fn fetch_history(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<OhlcBar>>;
}

/// Tries each source in order until one yields data
pub struct FallbackMarketData {
    sources: Vec<Box<dyn MarketData>>,
}

impl FallbackMarketData {
    pub fn new(sources: Vec<Box<dyn MarketData>>) -> Self {
        Self { sources }
    }

    /// Binance first, CryptoCompare when enabled
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let mut sources: Vec<Box<dyn MarketData>> = vec![Box::new(BinanceClient::new(config)?)];
        if config.cryptocompare_enabled {
            sources.push(Box::new(CryptoCompareClient::new(config)?));
        }
        Ok(Self::new(sources))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

/// Error for an exhausted walk: the last source error, if any
fn no_data(symbol: &str, last_err: Option<ForecastError>) -> ForecastError {
    last_err.unwrap_or_else(|| ForecastError::unavailable(symbol, "no source returned data"))
}

#[async_trait]
impl MarketData for FallbackMarketData {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<OhlcBar>> {
        let mut last_err = None;
        for source in &self.sources {
            match source.fetch_series(symbol, interval, count).await {
                // The caller drops the forming bar and needs MIN_SERIES_LEN closed ones
                Ok(bars) if bars.len() > MIN_SERIES_LEN => return Ok(bars),
                Ok(bars) => {
                    debug!(source = source.name(), symbol = %symbol, bars = bars.len(), "Series too short");
                }
                Err(e) => {
                    debug!(source = source.name(), symbol = %symbol, error = %e, "Series fetch failed");
                    last_err = Some(e);
                }
            }
        }
        Err(no_data(symbol, last_err))
    }

    async fn fetch_close_in_window(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Option<f64>> {
        let mut last_err = None;
        for source in &self.sources {
            match source.fetch_close_in_window(symbol, start_ms, end_ms).await {
                Ok(Some(close)) => return Ok(Some(close)),
                Ok(None) => {}
                Err(e) => {
                    debug!(source = source.name(), symbol = %symbol, error = %e, "Window close fetch failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn fetch_spot(&self, symbol: &str) -> Result<Option<f64>> {
        let mut last_err = None;
        for source in &self.sources {
            match source.fetch_spot(symbol).await {
                Ok(Some(price)) => return Ok(Some(price)),
                Ok(None) => {}
                Err(e) => {
                    debug!(source = source.name(), symbol = %symbol, error = %e, "Spot fetch failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<OhlcBar>> {
        let mut last_err = None;
        for source in &self.sources {
            match source.fetch_history(symbol, start_ms, end_ms).await {
                Ok(bars) if !bars.is_empty() => return Ok(bars),
                Ok(_) => {}
                Err(e) => {
                    debug!(source = source.name(), symbol = %symbol, error = %e, "History fetch failed");
                    last_err = Some(e);
                }
            }
        }
        Err(no_data(symbol, last_err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> OhlcBar {
        OhlcBar {
            ts,
            high: close,
            low: close,
            close,
        }
    }

    fn series(count: usize) -> Vec<OhlcBar> {
        (0..count as i64).map(|i| bar(i * 60_000, 100.0 + i as f64)).collect()
    }

    #[tokio::test]
    async fn test_falls_through_to_second_source() {
        let mut primary = MockMarketData::new();
        primary
            .expect_fetch_series()
            .returning(|_, _, _| Err(ForecastError::Network("HTTP 451".into())));
        primary.expect_name().return_const("primary");

        let mut secondary = MockMarketData::new();
        secondary
            .expect_fetch_series()
            .returning(|_, _, count| Ok(series(count)));

        let market = FallbackMarketData::new(vec![Box::new(primary), Box::new(secondary)]);
        let bars = market
            .fetch_series("BTCUSDT", BarInterval::Minute1, 61)
            .await
            .unwrap();
        assert_eq!(bars.len(), 61);
    }

    #[tokio::test]
    async fn test_short_series_falls_through() {
        let mut primary = MockMarketData::new();
        primary
            .expect_fetch_series()
            .returning(|_, _, _| Ok(series(MIN_SERIES_LEN)));
        primary.expect_name().return_const("primary");

        let mut secondary = MockMarketData::new();
        secondary
            .expect_fetch_series()
            .returning(|_, _, count| Ok(series(count)));

        let market = FallbackMarketData::new(vec![Box::new(primary), Box::new(secondary)]);
        let bars = market
            .fetch_series("BTCUSDT", BarInterval::Minute1, 61)
            .await
            .unwrap();
        assert_eq!(bars.len(), 61);
    }

    #[tokio::test]
    async fn test_short_series_everywhere_is_unavailable() {
        let mut only = MockMarketData::new();
        only.expect_fetch_series().returning(|_, _, _| Ok(series(2)));
        only.expect_name().return_const("only");
        let market = FallbackMarketData::new(vec![Box::new(only)]);
        let err = market
            .fetch_series("BTCUSDT", BarInterval::Minute1, 61)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_spot_miss_everywhere_is_none() {
        let mut only = MockMarketData::new();
        only.expect_fetch_spot().returning(|_| Ok(None));
        let market = FallbackMarketData::new(vec![Box::new(only)]);
        assert_eq!(market.fetch_spot("BTCUSDT").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_all_sources_failing_surfaces_last_error() {
        let mut only = MockMarketData::new();
        only.expect_fetch_close_in_window()
            .returning(|_, _, _| Err(ForecastError::Network("timeout".into())));
        only.expect_name().return_const("only");
        let market = FallbackMarketData::new(vec![Box::new(only)]);
        let err = market
            .fetch_close_in_window("BTCUSDT", 0, 120_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Network(_)));
    }

    #[test]
    fn test_interval_labels() {
        assert_eq!(BarInterval::Minute1.to_string(), "1m");
        assert_eq!(BarInterval::Hour1.duration_ms(), 3_600_000);
    }
}
