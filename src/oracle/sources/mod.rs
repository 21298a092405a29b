//! Price source implementations (Binance, CryptoCompare)

mod binance;
mod cryptocompare;

pub use binance::BinanceClient;
pub use cryptocompare::CryptoCompareClient;

use crate::config::OracleConfig;
use crate::error::{ForecastError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Quote asset stripped from pair symbols
const QUOTE_SUFFIX: &str = "USDT";

/// `BTCUSDT` -> `BTC`
pub fn base_asset(symbol: &str) -> &str {
    symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(symbol)
}

/// Shared GET-and-decode with rate-limit back-off
pub(crate) struct JsonFetcher {
    client: reqwest::Client,
    max_retries: u32,
    rate_limit_backoff: Duration,
    error_backoff: Duration,
}

impl JsonFetcher {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("forecastbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            rate_limit_backoff: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
        })
    }

    /// HTTP 429 and transport errors are retried with linear back-off
    /// (5s / 1s times the attempt number). Other HTTP errors fail at once.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut last_err = ForecastError::Network(format!("no attempt made for {}", url));

        for attempt in 1..=self.max_retries {
            match self.client.get(url).query(query).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = self.rate_limit_backoff * attempt;
                    warn!(url = %url, attempt, wait_secs = wait.as_secs(), "Rate limited, backing off");
                    last_err = ForecastError::Network(format!("HTTP 429 for {}", url));
                    if attempt < self.max_retries {
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(resp) if !resp.status().is_success() => {
                    return Err(ForecastError::Network(format!(
                        "HTTP {} for {}",
                        resp.status(),
                        url
                    )));
                }
                Ok(resp) => return Ok(resp.json::<T>().await?),
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "Request failed");
                    last_err = e.into();
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.error_backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_err)
    }
}

/// Parse a numeric JSON field that may be a string (`"42.1"`) or a number
pub(crate) fn as_price(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}
