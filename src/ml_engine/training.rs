//! Training Pipeline - standardize + batch gradient-descent logistic regression
//!
//! Produces the per-symbol/per-horizon `TrainedModel` consumed at scoring time.

use crate::ml_engine::dataset::{build_dataset, Dataset, OhlcBar};
use crate::ml_engine::features::FeatureName;
use crate::ml_engine::models::{sigmoid, TrainedModel};
use crate::types::Horizon;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Days of 1-minute history to fetch
    pub days: u32,
    /// Horizons with fewer labelled samples are skipped
    pub min_samples: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            days: 30,
            min_samples: 200,
            learning_rate: 0.05,
            epochs: 60,
            l2: 0.001,
        }
    }
}

/// Per-column scaler
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    pub mu: Array1<f64>,
    pub sd: Array1<f64>,
}

/// Standardize columns in place of a copy; zero std-dev columns use 1
pub fn standardize(x: &Array2<f64>) -> (Array2<f64>, Scaler) {
    let cols = x.ncols();
    let mu = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(cols));
    let sd = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s == 0.0 { 1.0 } else { s });
    let xn = (x - &mu) / &sd;
    (xn, Scaler { mu, sd })
}

/// Full-batch gradient descent with L2 on the weights (not the bias)
pub fn train_logreg(
    x: &Array2<f64>,
    y: &Array1<f64>,
    learning_rate: f64,
    epochs: usize,
    l2: f64,
) -> (Array1<f64>, f64) {
    let (n, d) = x.dim();
    let mut w = Array1::<f64>::zeros(d);
    let mut b = 0.0;
    if n == 0 {
        return (w, b);
    }

    for _ in 0..epochs {
        let p = (x.dot(&w) + b).mapv(sigmoid);
        let err = &p - y;
        let grad_w = x.t().dot(&err) / n as f64 + &w * l2;
        let grad_b = err.mean().unwrap_or(0.0);
        w.scaled_add(-learning_rate, &grad_w);
        b -= learning_rate * grad_b;
    }

    (w, b)
}

/// Fraction of samples whose thresholded probability matches the label
pub fn accuracy(x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>, b: f64) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let p = (x.dot(w) + b).mapv(sigmoid);
    let hits = p
        .iter()
        .zip(y.iter())
        .filter(|(p, y)| (**p >= 0.5) == (**y >= 0.5))
        .count();
    hits as f64 / y.len() as f64
}

pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit one horizon from raw bars.
    ///
    /// `None` when there are too few samples or the fit diverged, so an
    /// existing model file is left in place.
    pub fn fit(&self, symbol: &str, horizon: Horizon, bars: &[OhlcBar]) -> Option<TrainedModel> {
        let dataset = build_dataset(bars, horizon.minutes() as usize);
        if dataset.len() < self.config.min_samples {
            warn!(
                symbol = %symbol,
                horizon = %horizon,
                samples = dataset.len(),
                min = self.config.min_samples,
                "Too few samples, skipping horizon"
            );
            return None;
        }
        let model = self.fit_dataset(symbol, horizon, &dataset);
        let finite = model.bias.is_finite()
            && model
                .weights
                .iter()
                .chain(&model.mu)
                .chain(&model.sd)
                .all(|v| v.is_finite());
        if !finite {
            warn!(symbol = %symbol, horizon = %horizon, "Non-finite model parameters, skipping horizon");
            return None;
        }
        Some(model)
    }

    pub fn fit_dataset(&self, symbol: &str, horizon: Horizon, dataset: &Dataset) -> TrainedModel {
        let (x, y) = dataset.to_ndarray();
        let (xn, scaler) = standardize(&x);
        let (w, b) = train_logreg(
            &xn,
            &y,
            self.config.learning_rate,
            self.config.epochs,
            self.config.l2,
        );
        let in_sample = accuracy(&xn, &y, &w, b);

        info!(
            symbol = %symbol,
            horizon = %horizon,
            samples = dataset.len(),
            up_ratio = dataset.up_ratio(),
            accuracy = in_sample,
            "🎓 Model trained"
        );

        TrainedModel {
            feature_names: FeatureName::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            slots: FeatureName::ALL.iter().copied().map(Some).collect(),
            mu: scaler.mu.to_vec(),
            sd: scaler.sd.to_vec(),
            weights: w.to_vec(),
            bias: b,
            meta: Some(serde_json::json!({
                "trained_at": chrono::Utc::now().to_rfc3339(),
                "symbol": symbol,
                "horizon": horizon.minutes(),
                "n_samples": dataset.len(),
            })),
        }
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardize_centres_and_guards_constant_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let (xn, scaler) = standardize(&x);
        assert_eq!(scaler.mu, array![2.0, 5.0]);
        assert_eq!(scaler.sd, array![1.0, 1.0]);
        assert_eq!(xn, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_logreg_learns_a_separable_problem() {
        let x = array![[-2.0], [-1.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let (w, b) = train_logreg(&x, &y, 0.5, 200, 0.0);
        assert!(w[0] > 0.0);
        assert!(b.abs() < 1e-6);
        assert_eq!(accuracy(&x, &y, &w, b), 1.0);
    }

    #[test]
    fn test_l2_shrinks_weights() {
        let x = array![[-2.0], [-1.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let (free, _) = train_logreg(&x, &y, 0.05, 60, 0.0);
        let (shrunk, _) = train_logreg(&x, &y, 0.05, 60, 0.5);
        assert!(shrunk[0] < free[0]);
    }

    #[test]
    fn test_too_few_samples_are_skipped() {
        let bars: Vec<OhlcBar> = (0..50)
            .map(|i| OhlcBar {
                ts: i * 60_000,
                high: 100.0,
                low: 100.0,
                close: 100.0 + i as f64,
            })
            .collect();
        assert!(TrainingPipeline::default().fit("BTCUSDT", Horizon::Min15, &bars).is_none());
    }

    #[test]
    fn test_zero_close_in_history_still_fits_finite_model() {
        let mut bars: Vec<OhlcBar> = (0..3_000)
            .map(|i| {
                let c = 100.0 * (1.0 + 0.02 * (i as f64 / 40.0).sin());
                OhlcBar {
                    ts: i * 60_000,
                    high: c,
                    low: c,
                    close: c,
                }
            })
            .collect();
        bars[1_500].close = 0.0;

        let model = TrainingPipeline::default()
            .fit("BTCUSDT", Horizon::Min15, &bars)
            .unwrap();
        assert!(model.bias.is_finite());
        assert!(model.weights.iter().all(|w| w.is_finite()));

        let json = serde_json::to_string(&model.to_file()).unwrap();
        assert!(TrainedModel::from_json(&json, "zero_close").is_ok());
    }

    #[test]
    fn test_diverged_fit_is_rejected() {
        let bars: Vec<OhlcBar> = (0..3_000)
            .map(|i| {
                let c = 100.0 * (1.0 + 0.02 * (i as f64 / 40.0).sin());
                OhlcBar {
                    ts: i * 60_000,
                    high: c,
                    low: c,
                    close: c,
                }
            })
            .collect();
        let trainer = TrainingPipeline::new(TrainingConfig {
            learning_rate: f64::NAN,
            ..TrainingConfig::default()
        });
        assert!(trainer.fit("BTCUSDT", Horizon::Min15, &bars).is_none());
    }

    #[test]
    fn test_fitted_model_is_loadable() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..300 {
            let m = if i % 2 == 0 { 0.01 } else { -0.01 };
            features.push([50.0, 0.0, 0.0, m, 0.0, 0.001 * (i % 3) as f64]);
            labels.push(if m > 0.0 { 1.0 } else { 0.0 });
        }
        let dataset = Dataset { features, labels };
        let model = TrainingPipeline::default().fit_dataset("BTCUSDT", Horizon::Hour1, &dataset);

        assert_eq!(model.feature_names.len(), 6);
        assert_eq!(model.sd[0], 1.0);
        assert!(model.weights[3] > 0.0);

        let json = serde_json::to_string(&model.to_file()).unwrap();
        let reloaded = TrainedModel::from_json(&json, "roundtrip").unwrap();
        assert_eq!(reloaded.slots, model.slots);
        assert_eq!(model.meta.as_ref().unwrap()["horizon"], 60);
    }
}
