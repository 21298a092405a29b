//! CryptoCompare REST client, used when Binance is unreachable or geo-blocked
//!
//! Quotes are against USD, so prices differ marginally from USDT pairs.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::OracleConfig;
use crate::error::{ForecastError, Result};
use crate::ml_engine::OhlcBar;
use crate::oracle::sources::{as_price, base_asset, JsonFetcher};
use crate::oracle::{BarInterval, MarketData};

const QUOTE: &str = "USD";
/// Largest page served by the histo endpoints
const HISTO_PAGE_LIMIT: i64 = 2000;

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoPoint>,
}

#[derive(Debug, Deserialize)]
struct HistoPoint {
    /// Open time in seconds
    time: i64,
    high: f64,
    low: f64,
    close: f64,
}

impl From<HistoPoint> for OhlcBar {
    fn from(p: HistoPoint) -> Self {
        OhlcBar {
            ts: p.time * 1000,
            high: p.high,
            low: p.low,
            close: p.close,
        }
    }
}

pub struct CryptoCompareClient {
    base_url: String,
    http: JsonFetcher,
}

impl CryptoCompareClient {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.cryptocompare_url.trim_end_matches('/').to_string(),
            http: JsonFetcher::new(config)?,
        })
    }

    async fn histo(
        &self,
        symbol: &str,
        interval: BarInterval,
        limit: i64,
        to_ts_ms: Option<i64>,
    ) -> Result<Vec<OhlcBar>> {
        let path = match interval {
            BarInterval::Minute1 => "/data/v2/histominute",
            BarInterval::Hour1 => "/data/v2/histohour",
        };
        let mut query = vec![
            ("fsym", base_asset(symbol).to_string()),
            ("tsym", QUOTE.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(ts) = to_ts_ms {
            query.push(("toTs", (ts / 1000).to_string()));
        }

        let url = format!("{}{}", self.base_url, path);
        let resp: HistoResponse = self.http.get(&url, &query).await?;
        if resp.response == "Error" {
            return Err(ForecastError::unavailable(symbol, resp.message));
        }
        Ok(resp
            .data
            .map(|d| d.data.into_iter().map(OhlcBar::from).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl MarketData for CryptoCompareClient {
    fn name(&self) -> &'static str {
        "CryptoCompare"
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<OhlcBar>> {
        // `limit` is inclusive: limit=N returns N+1 points
        let limit = (count as i64 - 1).max(1);
        let mut bars = self.histo(symbol, interval, limit, None).await?;
        if bars.len() > count {
            bars.drain(..bars.len() - count);
        }
        Ok(bars)
    }

    async fn fetch_close_in_window(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Option<f64>> {
        let span = ((end_ms - start_ms) / BarInterval::Minute1.duration_ms()).max(1);
        let bars = self
            .histo(symbol, BarInterval::Minute1, span, Some(end_ms))
            .await?;
        Ok(bars
            .into_iter()
            .find(|b| b.ts >= start_ms && b.ts <= end_ms)
            .map(|b| b.close))
    }

    async fn fetch_spot(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/data/price", self.base_url);
        let quote: serde_json::Value = self
            .http
            .get(
                &url,
                &[("fsym", base_asset(symbol).to_string()), ("tsyms", QUOTE.to_string())],
            )
            .await?;
        Ok(as_price(&quote[QUOTE]))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<OhlcBar>> {
        let mut out: Vec<OhlcBar> = Vec::new();
        let mut cursor = end_ms;
        while cursor >= start_ms {
            let page = self
                .histo(symbol, BarInterval::Minute1, HISTO_PAGE_LIMIT, Some(cursor))
                .await?;
            let Some(oldest) = page.first().map(|b| b.ts) else {
                break;
            };
            out.splice(0..0, page);
            if oldest <= start_ms {
                break;
            }
            cursor = oldest - 1;
        }
        out.retain(|b| b.ts >= start_ms && b.ts <= end_ms);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histo_payload_maps_to_bars() {
        let raw = r#"{"Response":"Success","Message":"","Data":{"Aggregated":false,"Data":[
            {"time":1700000000,"high":101.0,"low":99.0,"open":100.0,"close":100.5,"volumefrom":1.0},
            {"time":1700000060,"high":102.0,"low":100.0,"open":100.5,"close":101.5,"volumefrom":2.0}
        ]}}"#;
        let resp: HistoResponse = serde_json::from_str(raw).unwrap();
        let bars: Vec<OhlcBar> = resp.data.unwrap().data.into_iter().map(OhlcBar::from).collect();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].ts, 1_700_000_060_000);
        assert_eq!(bars[1].close, 101.5);
    }

    #[test]
    fn test_error_payload_has_no_data() {
        let raw = r#"{"Response":"Error","Message":"fsym is a required param.","Data":{}}"#;
        let resp: HistoResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.response, "Error");
        assert!(resp.data.unwrap().data.is_empty());
    }
}
