//! Rolling-window hit-rate statistics
//!
//! Pure reductions over loaded records. Per-symbol output shape:
//!
//! ```json
//! { "h24": { "hit15": 57, "hit60": 50, "counts": { "h15": {..}, "h60": {..} } },
//!   "h7":  { .. },
//!   "h30": { .. } }
//! ```

use crate::types::{ForecastRecord, Horizon, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const HOUR_MS: i64 = 3_600_000;

/// Counts for one horizon inside one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    /// Every record in the window, Pending included
    pub count: u32,
    pub correct: u32,
    pub wrong: u32,
    pub no_trade: u32,
    /// `round(100 * correct / max(1, correct + wrong))`
    pub hit: u32,
}

impl WindowStats {
    /// Stats over records with `t >= cutoff_ms`
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a ForecastRecord>,
        cutoff_ms: i64,
    ) -> Self {
        let mut stats = WindowStats::default();
        for record in records.into_iter().filter(|r| r.t >= cutoff_ms) {
            stats.count += 1;
            match record.outcome {
                Outcome::Correct => stats.correct += 1,
                Outcome::Wrong => stats.wrong += 1,
                Outcome::NoTrade => stats.no_trade += 1,
                Outcome::Pending => {}
            }
        }
        stats.hit = hit_rate(stats.correct, stats.wrong);
        stats
    }

    pub fn resolved(&self) -> u32 {
        self.correct + self.wrong
    }
}

/// Percentage of resolved forecasts that were correct, 0 when none resolved
pub fn hit_rate(correct: u32, wrong: u32) -> u32 {
    let denom = (correct + wrong).max(1) as f64;
    (100.0 * correct as f64 / denom).round() as u32
}

/// A trailing window measured back from "now"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryWindow {
    pub label: String,
    pub length_ms: i64,
}

impl SummaryWindow {
    /// Labels: whole multi-day windows by day count (`168` -> `h7`), others by hours (`24` -> `h24`)
    pub fn from_hours(hours: u32) -> Self {
        let label = if hours >= 48 && hours % 24 == 0 {
            format!("h{}", hours / 24)
        } else {
            format!("h{}", hours)
        };
        Self {
            label,
            length_ms: hours as i64 * HOUR_MS,
        }
    }
}

/// All horizons for one window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// `hit15`, `hit60`
    #[serde(flatten)]
    pub hits: BTreeMap<String, u32>,
    /// `h15`, `h60`
    pub counts: BTreeMap<String, WindowStats>,
}

/// Window label -> summary
pub type SymbolSummary = BTreeMap<String, WindowSummary>;
/// Symbol -> per-symbol summary
pub type GlobalSummary = BTreeMap<String, SymbolSummary>;
/// Loaded records of one symbol, per horizon
pub type HorizonRecords = BTreeMap<Horizon, Vec<ForecastRecord>>;

pub struct WindowAggregator {
    windows: Vec<SummaryWindow>,
    horizons: Vec<Horizon>,
}

impl WindowAggregator {
    pub fn new(windows: Vec<SummaryWindow>, horizons: Vec<Horizon>) -> Self {
        Self { windows, horizons }
    }

    pub fn from_hours(hours: &[u32], horizons: Vec<Horizon>) -> Self {
        Self::new(hours.iter().map(|&h| SummaryWindow::from_hours(h)).collect(), horizons)
    }

    pub fn windows(&self) -> &[SummaryWindow] {
        &self.windows
    }

    pub fn summarize_symbol(&self, records: &HorizonRecords, now_ms: i64) -> SymbolSummary {
        self.summarize_with(now_ms, |horizon| {
            records.get(&horizon).map(|v| v.iter().collect()).unwrap_or_default()
        })
    }

    pub fn summarize_all(
        &self,
        by_symbol: &BTreeMap<String, HorizonRecords>,
        now_ms: i64,
    ) -> GlobalSummary {
        by_symbol
            .iter()
            .map(|(symbol, records)| (symbol.clone(), self.summarize_symbol(records, now_ms)))
            .collect()
    }

    /// Pooled stats across every symbol
    pub fn summarize_combined(
        &self,
        by_symbol: &BTreeMap<String, HorizonRecords>,
        now_ms: i64,
    ) -> SymbolSummary {
        self.summarize_with(now_ms, |horizon| {
            by_symbol
                .values()
                .filter_map(|records| records.get(&horizon))
                .flatten()
                .collect()
        })
    }

    fn summarize_with<'a, F>(&self, now_ms: i64, records_for: F) -> SymbolSummary
    where
        F: Fn(Horizon) -> Vec<&'a ForecastRecord>,
    {
        let per_horizon: Vec<(Horizon, Vec<&ForecastRecord>)> = self
            .horizons
            .iter()
            .map(|&h| (h, records_for(h)))
            .collect();

        self.windows
            .iter()
            .map(|window| {
                let cutoff = now_ms - window.length_ms;
                let mut summary = WindowSummary::default();
                for (horizon, records) in &per_horizon {
                    let stats = WindowStats::from_records(records.iter().copied(), cutoff);
                    summary.hits.insert(format!("hit{}", horizon.minutes()), stats.hit);
                    summary.counts.insert(format!("h{}", horizon.minutes()), stats);
                }
                (window.label.clone(), summary)
            })
            .collect()
    }
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::from_hours(&[24, 168, 720], Horizon::ALL.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, RangePct};

    const NOW: i64 = 1_000 * HOUR_MS;

    fn record(t: i64, horizon: Horizon, outcome: Outcome) -> ForecastRecord {
        ForecastRecord {
            id: ForecastRecord::make_id(t, horizon),
            t,
            src: "auto".to_string(),
            dir: Direction::Up,
            conf: 0.7,
            range: RangePct { lo: 0.2, hi: 0.4 },
            price_lo: 1.0,
            price_hi: 1.0,
            base: 1.0,
            horizon,
            outcome,
        }
    }

    #[test]
    fn test_empty_window_has_zero_hit() {
        let stats = WindowStats::from_records(std::iter::empty(), 0);
        assert_eq!(stats, WindowStats::default());
        assert_eq!(hit_rate(0, 0), 0);
    }

    #[test]
    fn test_hit_ignores_no_trade_and_pending() {
        let records = vec![
            record(NOW, Horizon::Min15, Outcome::Correct),
            record(NOW, Horizon::Min15, Outcome::Correct),
            record(NOW, Horizon::Min15, Outcome::Wrong),
            record(NOW, Horizon::Min15, Outcome::NoTrade),
            record(NOW, Horizon::Min15, Outcome::Pending),
        ];
        let stats = WindowStats::from_records(&records, 0);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.no_trade, 1);
        assert_eq!(stats.resolved(), 3);
        assert_eq!(stats.hit, 67);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let records = vec![
            record(NOW - 2 * HOUR_MS, Horizon::Min15, Outcome::Correct),
            record(NOW - 40 * HOUR_MS, Horizon::Min15, Outcome::Wrong),
            record(NOW - 24 * HOUR_MS, Horizon::Min15, Outcome::Correct),
        ];
        let stats = WindowStats::from_records(&records, NOW - 24 * HOUR_MS);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.hit, 100);
    }

    #[test]
    fn test_window_labels() {
        let labels: Vec<String> = [24, 168, 720, 12]
            .iter()
            .map(|&h| SummaryWindow::from_hours(h).label)
            .collect();
        assert_eq!(labels, vec!["h24", "h7", "h30", "h12"]);
    }

    #[test]
    fn test_symbol_summary_serializes_in_legacy_shape() {
        let mut records = HorizonRecords::new();
        records.insert(
            Horizon::Min15,
            vec![
                record(NOW - HOUR_MS, Horizon::Min15, Outcome::Correct),
                record(NOW - 100 * HOUR_MS, Horizon::Min15, Outcome::Wrong),
            ],
        );

        let summary = WindowAggregator::default().summarize_symbol(&records, NOW);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["h24"]["hit15"], 100);
        assert_eq!(json["h24"]["hit60"], 0);
        assert_eq!(json["h24"]["counts"]["h15"]["count"], 1);
        assert_eq!(json["h24"]["counts"]["h60"]["count"], 0);
        assert_eq!(json["h7"]["hit15"], 50);
        assert_eq!(json["h7"]["counts"]["h15"]["noTrade"], 0);
        assert!(json.get("h30").is_some());
    }

    #[test]
    fn test_global_summary_is_keyed_by_symbol_and_combined_pools() {
        let mut btc = HorizonRecords::new();
        btc.insert(Horizon::Min15, vec![record(NOW, Horizon::Min15, Outcome::Correct)]);
        let mut eth = HorizonRecords::new();
        eth.insert(Horizon::Min15, vec![record(NOW, Horizon::Min15, Outcome::Wrong)]);
        let by_symbol: BTreeMap<String, HorizonRecords> =
            [("BTCUSDT".to_string(), btc), ("ETHUSDT".to_string(), eth)].into();

        let aggregator = WindowAggregator::default();
        let global = aggregator.summarize_all(&by_symbol, NOW);
        assert_eq!(global.len(), 2);
        assert_eq!(global["BTCUSDT"]["h24"].hits["hit15"], 100);
        assert_eq!(global["ETHUSDT"]["h24"].hits["hit15"], 0);

        let combined = aggregator.summarize_combined(&by_symbol, NOW);
        assert_eq!(combined["h24"].counts["h15"].resolved(), 2);
        assert_eq!(combined["h24"].hits["hit15"], 50);
    }
}
