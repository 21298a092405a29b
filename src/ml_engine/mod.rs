//! ML Engine - feature extraction, scoring and offline training
//!
//! This module implements:
//! - Feature engineering over a closed-bar series
//! - Heuristic and trained linear scoring models
//! - The No-Trade decision policy
//! - Model persistence and logistic-regression training

pub mod dataset;
pub mod features;
pub mod filters;
pub mod models;
pub mod persistence;
pub mod predictor;
pub mod training;

pub use dataset::{build_dataset, Dataset, OhlcBar};
pub use features::{FeatureName, FeatureVector, MIN_SERIES_LEN};
pub use filters::{AbstainReason, Decision, DecisionPolicy, PolicyConfig, PriceBand};
pub use models::{ScoredPrediction, ScoringModel, TrainedModel};
pub use persistence::ModelStore;
pub use predictor::ForecastPredictor;
pub use training::{TrainingConfig, TrainingPipeline};
