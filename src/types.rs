//! Core types used throughout ForecastBot
//!
//! Defines horizons, directions, outcomes and the persisted forecast record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds in one minute
pub const MINUTE_MS: i64 = 60_000;

/// Supported forecast horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Horizon {
    Min15,
    Hour1,
}

impl Default for Horizon {
    fn default() -> Self {
        Horizon::Min15
    }
}

impl Horizon {
    pub const ALL: [Horizon; 2] = [Horizon::Min15, Horizon::Hour1];

    /// Lookahead in minutes
    pub fn minutes(&self) -> u32 {
        match self {
            Horizon::Min15 => 15,
            Horizon::Hour1 => 60,
        }
    }

    /// Lookahead in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.minutes() as i64 * MINUTE_MS
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            15 => Some(Horizon::Min15),
            60 => Some(Horizon::Hour1),
            _ => None,
        }
    }

    /// Index of the horizon-sized slot containing `ts_ms`
    pub fn slot(&self, ts_ms: i64) -> i64 {
        ts_ms.div_euclid(self.duration_ms())
    }

    pub fn same_slot(&self, a_ms: i64, b_ms: i64) -> bool {
        self.slot(a_ms) == self.slot(b_ms)
    }
}

impl TryFrom<u32> for Horizon {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Horizon::from_minutes(minutes).ok_or_else(|| format!("unsupported horizon: {}m", minutes))
    }
}

impl From<Horizon> for u32 {
    fn from(h: Horizon) -> u32 {
        h.minutes()
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Forecast direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// `Up` when the up-probability is at least one half
    pub fn from_probability(p_up: f64) -> Self {
        if p_up >= 0.5 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

/// Lifecycle state of a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    Correct,
    Wrong,
    #[serde(rename = "No-Trade")]
    NoTrade,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// Classify a realised move against the forecast direction.
    ///
    /// A flat close (`delta == 0`) counts for `Down`, never for `Up`.
    pub fn classify(direction: Direction, base: f64, close: f64) -> Self {
        let delta = close / base - 1.0;
        let correct = match direction {
            Direction::Up => delta > 0.0,
            Direction::Down => delta <= 0.0,
        };
        if correct {
            Outcome::Correct
        } else {
            Outcome::Wrong
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "Pending"),
            Outcome::Correct => write!(f, "Correct"),
            Outcome::Wrong => write!(f, "Wrong"),
            Outcome::NoTrade => write!(f, "No-Trade"),
        }
    }
}

/// Expected move band in percent, persisted as `[lo, hi]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct RangePct {
    pub lo: f64,
    pub hi: f64,
}

impl From<(f64, f64)> for RangePct {
    fn from((lo, hi): (f64, f64)) -> Self {
        Self { lo, hi }
    }
}

impl From<RangePct> for (f64, f64) {
    fn from(r: RangePct) -> Self {
        (r.lo, r.hi)
    }
}

fn default_src() -> String {
    "auto".to_string()
}

/// A persisted forecast, one JSON line per record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// `"{t}-{horizon minutes}"`
    pub id: String,
    /// Creation time (epoch ms)
    pub t: i64,
    /// Producer tag
    #[serde(default = "default_src")]
    pub src: String,
    pub dir: Direction,
    /// Confidence at creation
    pub conf: f64,
    pub range: RangePct,
    #[serde(rename = "priceLo")]
    pub price_lo: f64,
    #[serde(rename = "priceHi")]
    pub price_hi: f64,
    /// Last closed price of the input series
    pub base: f64,
    pub horizon: Horizon,
    pub outcome: Outcome,
}

impl ForecastRecord {
    pub fn make_id(t: i64, horizon: Horizon) -> String {
        format!("{}-{}", t, horizon.minutes())
    }

    /// Earliest time the record may be resolved
    pub fn due_ts(&self) -> i64 {
        self.t + self.horizon.duration_ms()
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        now_ms >= self.due_ts()
    }

    /// Pending and past its due time
    pub fn awaiting_resolution(&self, now_ms: i64) -> bool {
        self.outcome == Outcome::Pending && self.is_due(now_ms)
    }

    /// Settle a due Pending record against an observed close.
    ///
    /// Returns the new outcome, or `None` when the record is terminal or not yet due.
    pub fn settle(&mut self, close: f64, now_ms: i64) -> Option<Outcome> {
        if !self.awaiting_resolution(now_ms) {
            return None;
        }
        let outcome = Outcome::classify(self.dir, self.base, close);
        self.outcome = outcome;
        Some(outcome)
    }
}
