//! Scoring models - heuristic and trained linear models
//!
//! Both variants share the standardize → linear → sigmoid pipeline and differ
//! only in their parameters and output clamps.

use crate::error::{ForecastError, Result};
use crate::ml_engine::features::{FeatureName, FeatureVector};
use crate::types::RangePct;
use serde::{Deserialize, Serialize};

/// Output of a scoring model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPrediction {
    /// Probability of an up move (0.0 - 1.0)
    pub p_up: f64,
    pub confidence: f64,
    pub range_pct: RangePct,
}

/// Output clamps for one model variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBounds {
    pub confidence_min: f64,
    pub confidence_max: f64,
    pub range_min: f64,
    pub range_max: f64,
    /// Floor applied to sigma before the range is computed
    pub sigma_floor: f64,
}

pub const HEURISTIC_BOUNDS: ScoreBounds = ScoreBounds {
    confidence_min: 0.55,
    confidence_max: 0.95,
    range_min: 0.2,
    range_max: 2.0,
    sigma_floor: 0.0,
};

pub const TRAINED_BOUNDS: ScoreBounds = ScoreBounds {
    confidence_min: 0.55,
    confidence_max: 0.98,
    range_min: 0.2,
    range_max: 2.5,
    sigma_floor: 0.0005,
};

/// Lower edge of the range band, in percent
const RANGE_LO_MIN: f64 = 0.10;
const RANGE_LO_RATIO: f64 = 0.55;

const HEURISTIC_MU: [f64; 6] = [50.0, 0.0, 0.0, 0.0, 0.0, 0.003];
const HEURISTIC_SD: [f64; 6] = [12.0, 0.5, 0.3, 0.01, 0.005, 0.002];
const HEURISTIC_W: [f64; 6] = [0.35, 0.45, 0.25, 0.80, 0.30, -0.15];

/// Logistic function, saturating to exactly 0/1 beyond |z| > 40
pub fn sigmoid(z: f64) -> f64 {
    if z < -40.0 {
        0.0
    } else if z > 40.0 {
        1.0
    } else {
        1.0 / (1.0 + (-z).exp())
    }
}

/// Confidence and range from a probability and the raw features
fn finish(p_up: f64, features: &FeatureVector, bounds: &ScoreBounds) -> ScoredPrediction {
    let confidence = p_up
        .max(1.0 - p_up)
        .clamp(bounds.confidence_min, bounds.confidence_max);

    let sigma = features.sigma.max(bounds.sigma_floor);
    let rng = (0.8 * (sigma * 100.0) + 0.6 * (features.momentum.abs() * 100.0))
        .clamp(bounds.range_min, bounds.range_max);

    ScoredPrediction {
        p_up,
        confidence,
        range_pct: RangePct {
            lo: RANGE_LO_MIN.max(rng * RANGE_LO_RATIO),
            hi: rng,
        },
    }
}

/// Per-symbol/per-horizon linear model loaded from disk
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    /// Names as stored in the model file
    pub feature_names: Vec<String>,
    /// Resolved names; `None` contributes 0
    pub slots: Vec<Option<FeatureName>>,
    pub mu: Vec<f64>,
    pub sd: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub meta: Option<serde_json::Value>,
}

/// On-disk layout of a trained model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(rename = "W", default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default)]
    pub b: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<ScalerFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalerFile {
    #[serde(default)]
    pub mu: Option<Vec<f64>>,
    #[serde(default)]
    pub sd: Option<Vec<f64>>,
}

impl TrainedModel {
    /// Validate a parsed model file. `origin` names the file in errors.
    pub fn from_file(file: ModelFile, origin: &str) -> Result<Self> {
        let feature_names = file
            .features
            .ok_or_else(|| ForecastError::model_load(origin, "missing `features`"))?;
        let weights = file
            .weights
            .ok_or_else(|| ForecastError::model_load(origin, "missing `W`"))?;
        let scaler = file
            .scaler
            .ok_or_else(|| ForecastError::model_load(origin, "missing `scaler`"))?;
        let mu = scaler
            .mu
            .ok_or_else(|| ForecastError::model_load(origin, "missing `scaler.mu`"))?;
        let sd = scaler
            .sd
            .ok_or_else(|| ForecastError::model_load(origin, "missing `scaler.sd`"))?;

        if weights.len() != feature_names.len() {
            return Err(ForecastError::model_load(
                origin,
                format!(
                    "`W` has {} weights for {} features",
                    weights.len(),
                    feature_names.len()
                ),
            ));
        }

        let n = feature_names.len();
        let slots = feature_names
            .iter()
            .map(|name| FeatureName::from_name(name))
            .collect();
        // Short scaler arrays pad with identity entries; a zero sd is treated as 1
        let mu = (0..n).map(|i| mu.get(i).copied().unwrap_or(0.0)).collect();
        let sd = (0..n)
            .map(|i| match sd.get(i).copied() {
                Some(s) if s != 0.0 && s.is_finite() => s,
                _ => 1.0,
            })
            .collect();

        Ok(Self {
            feature_names,
            slots,
            mu,
            sd,
            weights,
            bias: file.b.unwrap_or(0.0),
            meta: file.meta,
        })
    }

    pub fn from_json(json: &str, origin: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(json)
            .map_err(|e| ForecastError::model_load(origin, e.to_string()))?;
        Self::from_file(file, origin)
    }

    pub fn to_file(&self) -> ModelFile {
        ModelFile {
            features: Some(self.feature_names.clone()),
            weights: Some(self.weights.clone()),
            b: Some(self.bias),
            scaler: Some(ScalerFile {
                mu: Some(self.mu.clone()),
                sd: Some(self.sd.clone()),
            }),
            meta: self.meta.clone(),
        }
    }

    /// Raw inputs in the model's own feature order
    pub fn inputs(&self, features: &FeatureVector) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| slot.map(|f| features.get(f)).unwrap_or(0.0))
            .collect()
    }

    pub fn logit(&self, features: &FeatureVector) -> f64 {
        self.inputs(features)
            .iter()
            .enumerate()
            .fold(self.bias, |z, (i, x)| {
                z + self.weights[i] * ((x - self.mu[i]) / self.sd[i])
            })
    }
}

/// Model used for one symbol/horizon
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringModel {
    Heuristic,
    Trained(TrainedModel),
}

impl Default for ScoringModel {
    fn default() -> Self {
        ScoringModel::Heuristic
    }
}

impl ScoringModel {
    pub fn name(&self) -> &'static str {
        match self {
            ScoringModel::Heuristic => "heuristic",
            ScoringModel::Trained(_) => "trained",
        }
    }

    pub fn bounds(&self) -> &'static ScoreBounds {
        match self {
            ScoringModel::Heuristic => &HEURISTIC_BOUNDS,
            ScoringModel::Trained(_) => &TRAINED_BOUNDS,
        }
    }

    pub fn score(&self, features: &FeatureVector) -> ScoredPrediction {
        let z = match self {
            ScoringModel::Heuristic => heuristic_logit(features),
            ScoringModel::Trained(model) => model.logit(features),
        };
        finish(sigmoid(z), features, self.bounds())
    }
}

fn heuristic_logit(features: &FeatureVector) -> f64 {
    FeatureName::ALL
        .iter()
        .enumerate()
        .map(|(i, &f)| HEURISTIC_W[i] * ((features.get(f) - HEURISTIC_MU[i]) / HEURISTIC_SD[i]))
        .sum()
}
