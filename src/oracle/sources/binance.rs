//! Binance REST client for klines and spot quotes

use async_trait::async_trait;
use std::time::Duration;

use crate::config::OracleConfig;
use crate::error::{ForecastError, Result};
use crate::ml_engine::OhlcBar;
use crate::oracle::sources::{as_price, JsonFetcher};
use crate::oracle::{BarInterval, MarketData};

const KLINES_PATH: &str = "/api/v3/klines";
const TICKER_PATH: &str = "/api/v3/ticker/price";
/// Largest page Binance serves per klines request
const KLINES_PAGE_LIMIT: usize = 1000;
const PAGE_DELAY: Duration = Duration::from_millis(100);

pub struct BinanceClient {
    base_url: String,
    http: JsonFetcher,
}

impl BinanceClient {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.binance_url.trim_end_matches('/').to_string(),
            http: JsonFetcher::new(config)?,
        })
    }

    async fn klines(&self, query: &[(&str, String)]) -> Result<Vec<OhlcBar>> {
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        // [[open_time, open, high, low, close, volume, close_time, ...], ...]
        let klines: Vec<Vec<serde_json::Value>> = self.http.get(&url, query).await?;
        Ok(parse_klines(klines))
    }
}

/// Rows shorter than five columns or with unparsable prices are dropped
pub(crate) fn parse_klines(klines: Vec<Vec<serde_json::Value>>) -> Vec<OhlcBar> {
    klines
        .into_iter()
        .filter_map(|kline| {
            if kline.len() < 5 {
                return None;
            }
            Some(OhlcBar {
                ts: kline[0].as_i64()?,
                high: as_price(&kline[2])?,
                low: as_price(&kline[3])?,
                close: as_price(&kline[4])?,
            })
        })
        .collect()
}

#[async_trait]
impl MarketData for BinanceClient {
    fn name(&self) -> &'static str {
        "Binance"
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<OhlcBar>> {
        let bars = self
            .klines(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", count.to_string()),
            ])
            .await?;

        tracing::debug!(symbol = %symbol, interval = %interval, count = bars.len(), "📥 Binance klines fetched");
        Ok(bars)
    }

    async fn fetch_close_in_window(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Option<f64>> {
        let bars = self
            .klines(&[
                ("symbol", symbol.to_string()),
                ("interval", BarInterval::Minute1.to_string()),
                ("startTime", start_ms.to_string()),
                ("endTime", end_ms.to_string()),
                ("limit", "1".to_string()),
            ])
            .await?;

        Ok(bars
            .into_iter()
            .find(|b| b.ts >= start_ms && b.ts <= end_ms)
            .map(|b| b.close))
    }

    async fn fetch_spot(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}{}", self.base_url, TICKER_PATH);
        let ticker: serde_json::Value = self.http.get(&url, &[("symbol", symbol.to_string())]).await?;
        Ok(as_price(&ticker["price"]))
    }

    /// Pages backwards from `end_ms` in 1000-bar chunks
    async fn fetch_history(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<OhlcBar>> {
        if start_ms > end_ms {
            return Err(ForecastError::unavailable(symbol, "empty history range"));
        }

        let mut out: Vec<OhlcBar> = Vec::new();
        let mut cursor = end_ms;
        loop {
            let page = self
                .klines(&[
                    ("symbol", symbol.to_string()),
                    ("interval", BarInterval::Minute1.to_string()),
                    ("endTime", cursor.to_string()),
                    ("limit", KLINES_PAGE_LIMIT.to_string()),
                ])
                .await?;

            let Some(oldest) = page.first().map(|b| b.ts) else {
                break;
            };
            let full_page = page.len() >= KLINES_PAGE_LIMIT;
            out.splice(0..0, page);

            if oldest <= start_ms || !full_page {
                break;
            }
            cursor = oldest - 1;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        out.retain(|b| b.ts >= start_ms && b.ts <= end_ms);
        tracing::info!(symbol = %symbol, bars = out.len(), "📥 Binance history fetched");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_klines_parse_string_prices() {
        let raw: Vec<Vec<serde_json::Value>> = serde_json::from_value(json!([
            [1700000000000_i64, "100.0", "101.5", "99.5", "100.7", "12.0", 1700000059999_i64],
            [1700000060000_i64, "100.7", "bad", "99.0", "100.1", "3.0", 1700000119999_i64],
            [1700000120000_i64, "100.1"]
        ]))
        .unwrap();

        let bars = parse_klines(raw);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].ts, 1_700_000_000_000);
        assert_eq!(bars[0].high, 101.5);
        assert_eq!(bars[0].close, 100.7);
    }
}
