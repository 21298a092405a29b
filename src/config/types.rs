//! Configuration types and re-exports

pub use super::{
    AppConfig, BotConfig, LogConfig, OracleConfig, PacingConfig, PersistenceConfig, SummaryConfig,
};
pub use crate::ml_engine::{PolicyConfig, TrainingConfig};
