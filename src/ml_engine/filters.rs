//! Decision policy - direction, price band and the No-Trade filter

use crate::ml_engine::models::ScoredPrediction;
use crate::types::{Direction, Outcome, RangePct};
use serde::{Deserialize, Serialize};

/// Why a forecast was recorded as No-Trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbstainReason {
    LowConfidence,
    NarrowRange,
}

impl std::fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbstainReason::LowConfidence => write!(f, "low_confidence"),
            AbstainReason::NarrowRange => write!(f, "narrow_range"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Below this confidence the forecast is No-Trade
    pub min_confidence: f64,
    /// Below this upper range edge (percent) the forecast is No-Trade
    pub min_range_hi: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.62,
            min_range_hi: 0.30,
        }
    }
}

/// Absolute price band implied by a percent range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub lo: f64,
    pub hi: f64,
}

impl PriceBand {
    pub fn from_range(base: f64, range: RangePct, direction: Direction) -> Self {
        match direction {
            Direction::Up => Self {
                lo: base * (1.0 + range.lo / 100.0),
                hi: base * (1.0 + range.hi / 100.0),
            },
            Direction::Down => Self {
                lo: base * (1.0 - range.hi / 100.0),
                hi: base * (1.0 - range.lo / 100.0),
            },
        }
    }
}

/// Result of applying the policy to one scored prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub direction: Direction,
    pub band: PriceBand,
    /// `Pending` or `NoTrade`, fixed at creation
    pub outcome: Outcome,
    pub abstain: Option<AbstainReason>,
}

pub struct DecisionPolicy {
    pub config: PolicyConfig,
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn abstain_reason(&self, prediction: &ScoredPrediction) -> Option<AbstainReason> {
        if prediction.confidence < self.config.min_confidence {
            Some(AbstainReason::LowConfidence)
        } else if prediction.range_pct.hi < self.config.min_range_hi {
            Some(AbstainReason::NarrowRange)
        } else {
            None
        }
    }

    pub fn decide(&self, prediction: &ScoredPrediction, base: f64) -> Decision {
        let direction = Direction::from_probability(prediction.p_up);
        let abstain = self.abstain_reason(prediction);

        Decision {
            direction,
            band: PriceBand::from_range(base, prediction.range_pct, direction),
            outcome: if abstain.is_some() {
                Outcome::NoTrade
            } else {
                Outcome::Pending
            },
            abstain,
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
