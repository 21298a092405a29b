//! Model persistence - trained models on disk, one file per symbol/horizon
//!
//! Layout: `{data_dir}/models/{SYMBOL}/{h}m.json`

use crate::error::{ForecastError, Result};
use crate::ml_engine::models::{ScoringModel, TrainedModel};
use crate::types::Horizon;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            models_dir: data_dir.as_ref().join("models"),
        }
    }

    pub fn path_for(&self, symbol: &str, horizon: Horizon) -> PathBuf {
        self.models_dir
            .join(symbol)
            .join(format!("{}m.json", horizon.minutes()))
    }

    /// `Ok(None)` when no model was trained for this symbol/horizon
    pub fn load(&self, symbol: &str, horizon: Horizon) -> Result<Option<TrainedModel>> {
        let path = self.path_for(symbol, horizon);
        if !path.exists() {
            return Ok(None);
        }
        let origin = path.display().to_string();
        let json = fs::read_to_string(&path)
            .map_err(|e| ForecastError::model_load(&origin, e.to_string()))?;
        TrainedModel::from_json(&json, &origin).map(Some)
    }

    pub fn save(&self, symbol: &str, horizon: Horizon, model: &TrainedModel) -> Result<PathBuf> {
        let path = self.path_for(symbol, horizon);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&model.to_file())?;
        fs::write(&path, json)?;
        info!("💾 Model saved to {}", path.display());
        Ok(path)
    }

    /// Trained model when a valid one exists, heuristic otherwise.
    ///
    /// An unusable model file is logged and never fails the run.
    pub fn scoring_model(&self, symbol: &str, horizon: Horizon) -> ScoringModel {
        match self.load(symbol, horizon) {
            Ok(Some(model)) => ScoringModel::Trained(model),
            Ok(None) => ScoringModel::Heuristic,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    horizon = %horizon,
                    error = %e,
                    "Unusable model file, falling back to heuristic"
                );
                ScoringModel::Heuristic
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_engine::features::FeatureName;

    fn temp_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("forecastbot_models_{}", uuid::Uuid::new_v4()))
    }

    fn sample_model() -> TrainedModel {
        TrainedModel {
            feature_names: vec!["rsi".to_string(), "momentum".to_string()],
            slots: vec![Some(FeatureName::Rsi), Some(FeatureName::Momentum)],
            mu: vec![50.0, 0.0],
            sd: vec![10.0, 0.01],
            weights: vec![0.2, 0.7],
            bias: -0.1,
            meta: Some(serde_json::json!({ "n_samples": 500 })),
        }
    }

    #[test]
    fn test_missing_model_means_heuristic() {
        let dir = temp_data_dir();
        let store = ModelStore::new(&dir);
        assert!(store.load("BTCUSDT", Horizon::Min15).unwrap().is_none());
        assert_eq!(store.scoring_model("BTCUSDT", Horizon::Min15), ScoringModel::Heuristic);
    }

    #[test]
    fn test_saved_model_loads_back() {
        let dir = temp_data_dir();
        let store = ModelStore::new(&dir);
        let model = sample_model();
        let path = store.save("ETHUSDT", Horizon::Hour1, &model).unwrap();
        assert!(path.ends_with("models/ETHUSDT/60m.json"));

        let loaded = store.load("ETHUSDT", Horizon::Hour1).unwrap().unwrap();
        assert_eq!(loaded, model);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_model_falls_back_to_heuristic() {
        let dir = temp_data_dir();
        let store = ModelStore::new(&dir);
        let path = store.path_for("BTCUSDT", Horizon::Min15);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"features":["rsi"],"b":0.1}"#).unwrap();

        assert!(matches!(
            store.load("BTCUSDT", Horizon::Min15),
            Err(ForecastError::ModelLoad { .. })
        ));
        assert_eq!(store.scoring_model("BTCUSDT", Horizon::Min15), ScoringModel::Heuristic);
        let _ = fs::remove_dir_all(&dir);
    }
}
