//! Dataset - labelled samples built from 1-minute OHLC history
//!
//! Each sample is the six-feature row at bar `i`, labelled by the close
//! `horizon` bars later. Moves inside the dead-zone carry no label and are
//! dropped.

use crate::ml_engine::features::{ema, population_std, FeatureVector};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Bars needed before the first sample (EMA/RSI warm-up)
pub const WARMUP_BARS: usize = 15;
const MOMENTUM_LOOKBACK: usize = 15;
const SIGMA_WINDOW: usize = 30;
const RSI_PERIOD: usize = 14;
/// Moves within ±0.10% are dropped
pub const DEAD_ZONE: f64 = 0.001;

/// One closed 1-minute bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    /// Open time (epoch ms)
    pub ts: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Rows in `FeatureName::ALL` order
    pub features: Vec<[f64; FeatureVector::NUM_FEATURES]>,
    /// 1.0 = up beyond the dead-zone, 0.0 = down beyond it
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Share of up labels
    pub fn up_ratio(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().sum::<f64>() / self.labels.len() as f64
    }

    pub fn to_ndarray(&self) -> (Array2<f64>, Array1<f64>) {
        let n = self.features.len();
        let mut x = Array2::zeros((n, FeatureVector::NUM_FEATURES));
        for (i, row) in self.features.iter().enumerate() {
            for (j, &val) in row.iter().enumerate() {
                x[[i, j]] = val;
            }
        }
        (x, Array1::from_vec(self.labels.clone()))
    }
}

/// Build the labelled dataset for one horizon (in bars).
///
/// Bars with a non-finite or non-positive close (zero-filled gaps) are skipped.
pub fn build_dataset(bars: &[OhlcBar], horizon: usize) -> Dataset {
    let close: Vec<f64> = bars
        .iter()
        .map(|b| b.close)
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    let mut dataset = Dataset::default();
    if close.len() <= horizon + 1 {
        return dataset;
    }

    let ema5 = ema(&close, 5);
    let ema15 = ema(&close, 15);
    let rsi = rsi_series(&close);

    for i in WARMUP_BARS..close.len() - horizon - 1 {
        let future = close[i + horizon];
        let label = match future / close[i] - 1.0 {
            m if m > DEAD_ZONE => 1.0,
            m if m < -DEAD_ZONE => 0.0,
            _ => continue,
        };

        let momentum = close[i] / close[i - MOMENTUM_LOOKBACK].max(1e-9) - 1.0;
        dataset.features.push([
            rsi[i],
            ema5[i] - ema5[i - 1],
            ema15[i] - ema15[i - 1],
            momentum,
            close[i] / close[i - 1] - 1.0,
            sigma_of_returns(&close, i, SIGMA_WINDOW),
        ]);
        dataset.labels.push(label);
    }

    dataset
}

/// Running mean over at most `period` trailing values
pub fn sma(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    let mut sum = 0.0;
    for i in 0..series.len() {
        sum += series[i];
        if i >= period {
            sum -= series[i - period];
        }
        out.push(sum / (i + 1).min(period) as f64);
    }
    out
}

/// SMA-smoothed 14-step RSI at every bar, loss floored at 1e-6
pub fn rsi_series(close: &[f64]) -> Vec<f64> {
    let mut gains = vec![0.0];
    let mut losses = vec![0.0];
    for w in close.windows(2) {
        let d = w[1] - w[0];
        gains.push(d.max(0.0));
        losses.push((-d).max(0.0));
    }
    let avg_gain = sma(&gains, RSI_PERIOD);
    let avg_loss = sma(&losses, RSI_PERIOD);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .take(close.len())
        .map(|(&g, &l)| {
            let l = if l == 0.0 { 1e-6 } else { l };
            100.0 - 100.0 / (1.0 + g / l)
        })
        .collect()
}

/// Population std-dev of the step returns ending at bar `i` (at most `window` of them)
pub fn sigma_of_returns(close: &[f64], i: usize, window: usize) -> f64 {
    if i < 1 {
        return 0.0;
    }
    let start = (i + 1).saturating_sub(window).max(1);
    let returns: Vec<f64> = (start..=i).map(|j| close[j] / close[j - 1] - 1.0).collect();
    population_std(&returns)
}
