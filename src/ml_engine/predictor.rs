//! Forecast predictor - closes in, forecast record out

use crate::error::Result;
use crate::ml_engine::features::FeatureVector;
use crate::ml_engine::filters::{DecisionPolicy, PolicyConfig};
use crate::ml_engine::models::ScoringModel;
use crate::types::{ForecastRecord, Horizon};
use tracing::debug;

/// Producer tag written into generated records
pub const AUTO_SOURCE: &str = "auto";

pub struct ForecastPredictor {
    policy: DecisionPolicy,
}

impl ForecastPredictor {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            policy: DecisionPolicy::new(config),
        }
    }

    /// Build a forecast from closed bars (oldest first).
    ///
    /// The last close becomes the record's base price.
    pub fn forecast(
        &self,
        symbol: &str,
        horizon: Horizon,
        closes: &[f64],
        model: &ScoringModel,
        now_ms: i64,
    ) -> Result<ForecastRecord> {
        let features = FeatureVector::try_from_closes(symbol, closes)?;
        let base = closes[closes.len() - 1];
        let scored = model.score(&features);
        let decision = self.policy.decide(&scored, base);

        debug!(
            symbol = %symbol,
            horizon = %horizon,
            model = model.name(),
            p_up = scored.p_up,
            rsi = features.rsi,
            sigma = features.sigma,
            abstain = ?decision.abstain,
            "Scored forecast"
        );

        Ok(ForecastRecord {
            id: ForecastRecord::make_id(now_ms, horizon),
            t: now_ms,
            src: AUTO_SOURCE.to_string(),
            dir: decision.direction,
            conf: scored.confidence,
            range: scored.range_pct,
            price_lo: decision.band.lo,
            price_hi: decision.band.hi,
            base,
            horizon,
            outcome: decision.outcome,
        })
    }

    /// One forecast per horizon slot: false when `last` was made in the current slot
    pub fn slot_open(last: Option<&ForecastRecord>, horizon: Horizon, now_ms: i64) -> bool {
        match last {
            Some(prev) => !horizon.same_slot(prev.t, now_ms),
            None => true,
        }
    }
}

impl Default for ForecastPredictor {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
