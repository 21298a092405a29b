//! Feature Engineering - fixed feature vector from a close series
//!
//! Turns an ordered series of closes (oldest first) into the six features the
//! scoring models consume.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Shortest series the extractor accepts: 14-step RSI lookback plus one difference
pub const MIN_SERIES_LEN: usize = 16;

const EMA_SHORT_PERIOD: usize = 5;
const EMA_LONG_PERIOD: usize = 15;
const RSI_PERIOD: usize = 14;
/// Substituted for a zero average gain/loss
pub const RSI_FLOOR: f64 = 1e-6;

/// Feature vector for one prediction run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// RSI over the first 15 closes (0-100)
    pub rsi: f64,
    /// Last step of EMA(5)
    pub ema_short_slope: f64,
    /// Last step of EMA(15)
    pub ema_long_slope: f64,
    /// last / first - 1
    pub momentum: f64,
    /// Most recent step return
    pub last_return: f64,
    /// Population std-dev of step returns
    pub sigma: f64,
}

/// Names a model file may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureName {
    Rsi,
    EmaShortSlope,
    EmaLongSlope,
    Momentum,
    LastReturn,
    Sigma,
}

impl FeatureName {
    /// Canonical order, shared by the heuristic model and the trainer
    pub const ALL: [FeatureName; 6] = [
        FeatureName::Rsi,
        FeatureName::EmaShortSlope,
        FeatureName::EmaLongSlope,
        FeatureName::Momentum,
        FeatureName::LastReturn,
        FeatureName::Sigma,
    ];

    /// Name used in persisted model files
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Rsi => "rsi",
            FeatureName::EmaShortSlope => "ema5_slope",
            FeatureName::EmaLongSlope => "ema15_slope",
            FeatureName::Momentum => "momentum",
            FeatureName::LastReturn => "lastRet",
            FeatureName::Sigma => "sigma",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FeatureName::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl FeatureVector {
    pub const NUM_FEATURES: usize = 6;

    /// Compute features from closes.
    ///
    /// Caller guarantees `closes.len() >= MIN_SERIES_LEN` and positive values.
    pub fn from_closes(closes: &[f64]) -> Self {
        let first = closes[0];
        let last = closes[closes.len() - 1];
        let returns = step_returns(closes);

        Self {
            rsi: rsi(closes),
            ema_short_slope: ema_slope(closes, EMA_SHORT_PERIOD),
            ema_long_slope: ema_slope(closes, EMA_LONG_PERIOD),
            momentum: last / first - 1.0,
            last_return: returns.last().copied().unwrap_or(0.0),
            sigma: population_std(&returns),
        }
    }

    /// Checked entry point for data coming off the wire
    pub fn try_from_closes(symbol: &str, closes: &[f64]) -> Result<Self> {
        if closes.len() < MIN_SERIES_LEN {
            return Err(ForecastError::unavailable(
                symbol,
                format!("need {} closes, got {}", MIN_SERIES_LEN, closes.len()),
            ));
        }
        if let Some(bad) = closes.iter().find(|c| !c.is_finite() || **c <= 0.0) {
            return Err(ForecastError::unavailable(
                symbol,
                format!("non-positive close in series: {}", bad),
            ));
        }
        Ok(Self::from_closes(closes))
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::Rsi => self.rsi,
            FeatureName::EmaShortSlope => self.ema_short_slope,
            FeatureName::EmaLongSlope => self.ema_long_slope,
            FeatureName::Momentum => self.momentum,
            FeatureName::LastReturn => self.last_return,
            FeatureName::Sigma => self.sigma,
        }
    }

    /// Values in `FeatureName::ALL` order
    pub fn to_vec(&self) -> Vec<f64> {
        FeatureName::ALL.iter().map(|&f| self.get(f)).collect()
    }
}

/// EMA seeded with the first value, `k = 2 / (period + 1)`
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    let Some(&seed) = series.first() else {
        return Vec::new();
    };
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    let mut prev = seed;
    out.push(prev);
    for &x in &series[1..] {
        prev = x * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Difference between the two most recent EMA values
pub fn ema_slope(series: &[f64], period: usize) -> f64 {
    let values = ema(series, period);
    match values.len() {
        0 | 1 => 0.0,
        n => values[n - 1] - values[n - 2],
    }
}

pub fn step_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// 14-step RSI over the first 15 closes.
///
/// A zero average loss is floored at `RSI_FLOOR`, so a flat series gives 0, not 50.
pub fn rsi(closes: &[f64]) -> f64 {
    let mut gains = 0.0;
    let mut losses = 0.0;
    for w in closes.windows(2).take(RSI_PERIOD) {
        let d = w[1] - w[0];
        if d >= 0.0 {
            gains += d;
        } else {
            losses -= d;
        }
    }
    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = floor_zero(losses / RSI_PERIOD as f64);
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

fn floor_zero(v: f64) -> f64 {
    if v == 0.0 {
        RSI_FLOOR
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_flat_series_yields_zero_features_and_zero_rsi() {
        let closes = vec![100.0; 20];
        let f = FeatureVector::from_closes(&closes);
        assert_eq!(f.momentum, 0.0);
        assert_eq!(f.last_return, 0.0);
        assert_eq!(f.sigma, 0.0);
        assert_eq!(f.ema_short_slope, 0.0);
        assert_eq!(f.ema_long_slope, 0.0);
        assert_eq!(f.rsi, 0.0);
    }

    #[test]
    fn test_rising_series_saturates_rsi() {
        let closes = ramp(30, 100.0, 1.0);
        let f = FeatureVector::from_closes(&closes);
        assert!(f.rsi > 99.9);
        assert!(f.momentum > 0.28 && f.momentum < 0.30);
        assert!(f.ema_short_slope > 0.0);
        assert!(f.ema_long_slope > 0.0);
        assert!(f.sigma > 0.0);
    }

    #[test]
    fn test_rsi_only_looks_at_first_fifteen_closes() {
        let mut closes = ramp(15, 100.0, 1.0);
        closes.extend(ramp(15, 114.0, -2.0));
        assert!(rsi(&closes) > 99.9);
    }

    #[test]
    fn test_ema_is_seeded_with_first_value() {
        let values = ema(&[10.0, 20.0], 3);
        assert_eq!(values[0], 10.0);
        assert!((values[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_population_std_divides_by_n() {
        let sd = population_std(&[1.0, 3.0]);
        assert!((sd - 1.0).abs() < 1e-12);
        assert_eq!(population_std(&[]), 0.0);
    }

    #[test]
    fn test_short_series_is_data_unavailable() {
        let err = FeatureVector::try_from_closes("BTCUSDT", &[1.0; 10]).unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    }

    #[test]
    fn test_non_positive_close_is_rejected() {
        let mut closes = vec![1.0; 20];
        closes[4] = 0.0;
        assert!(FeatureVector::try_from_closes("BTCUSDT", &closes).is_err());
    }

    #[test]
    fn test_feature_names_round_trip() {
        for f in FeatureName::ALL {
            assert_eq!(FeatureName::from_name(f.as_str()), Some(f));
        }
        assert_eq!(FeatureName::from_name("macd"), None);
    }
}
