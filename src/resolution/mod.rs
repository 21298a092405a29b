//! Outcome resolution - settles due Pending forecasts against observed prices
//!
//! For each due record the resolver walks an ordered list of price attempts:
//! the close of the first 1-minute bar opening within `[due, due + tolerance]`,
//! then the current spot price. A record with no usable price stays Pending
//! and is retried on the next run.

use crate::error::Result;
use crate::oracle::MarketData;
use crate::persistence::RecordStore;
use crate::types::{ForecastRecord, Horizon, Outcome};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default window after due time in which a close is accepted
pub const DEFAULT_CLOSE_TOLERANCE_MS: i64 = 120_000;

/// One step of the price fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceAttempt {
    CloseInWindow { start_ms: i64, end_ms: i64 },
    Spot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceLookup {
    Found(f64),
    Unavailable(String),
}

/// Counters for one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Records whose outcome changed
    pub changed: usize,
    pub correct: usize,
    pub wrong: usize,
    /// Pending records not yet due
    pub not_due: usize,
    /// Due records left Pending for lack of a price
    pub unavailable: usize,
    /// Lines skipped while loading
    pub malformed: usize,
}

impl ResolutionReport {
    pub fn merge(&mut self, other: &ResolutionReport) {
        self.changed += other.changed;
        self.correct += other.correct;
        self.wrong += other.wrong;
        self.not_due += other.not_due;
        self.unavailable += other.unavailable;
        self.malformed += other.malformed;
    }
}

pub struct OutcomeResolver<'a, M: MarketData + ?Sized> {
    market: &'a M,
    tolerance_ms: i64,
}

impl<'a, M: MarketData + ?Sized> OutcomeResolver<'a, M> {
    pub fn new(market: &'a M, tolerance_ms: i64) -> Self {
        Self {
            market,
            tolerance_ms,
        }
    }

    /// Fallback chain for a record due at `due_ms`
    pub fn attempts_for(&self, due_ms: i64) -> [PriceAttempt; 2] {
        [
            PriceAttempt::CloseInWindow {
                start_ms: due_ms,
                end_ms: due_ms + self.tolerance_ms,
            },
            PriceAttempt::Spot,
        ]
    }

    async fn try_attempt(&self, symbol: &str, attempt: PriceAttempt) -> PriceLookup {
        let fetched = match attempt {
            PriceAttempt::CloseInWindow { start_ms, end_ms } => {
                self.market.fetch_close_in_window(symbol, start_ms, end_ms).await
            }
            PriceAttempt::Spot => self.market.fetch_spot(symbol).await,
        };
        match fetched {
            Ok(Some(price)) if price.is_finite() && price > 0.0 => PriceLookup::Found(price),
            Ok(Some(price)) => PriceLookup::Unavailable(format!("unusable price {}", price)),
            Ok(None) => PriceLookup::Unavailable("no data".to_string()),
            Err(e) => PriceLookup::Unavailable(e.to_string()),
        }
    }

    /// First usable price along the chain
    pub async fn close_for(&self, symbol: &str, due_ms: i64) -> PriceLookup {
        let mut reasons = Vec::new();
        for attempt in self.attempts_for(due_ms) {
            match self.try_attempt(symbol, attempt).await {
                PriceLookup::Found(price) => return PriceLookup::Found(price),
                PriceLookup::Unavailable(reason) => {
                    debug!(symbol = %symbol, ?attempt, reason = %reason, "Price attempt missed");
                    reasons.push(reason);
                }
            }
        }
        PriceLookup::Unavailable(reasons.join("; "))
    }

    /// Settle every due Pending record in place. Terminal records are never touched.
    pub async fn resolve_records(
        &self,
        symbol: &str,
        records: &mut [ForecastRecord],
        now_ms: i64,
    ) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        for record in records.iter_mut() {
            if record.outcome != Outcome::Pending {
                continue;
            }
            if !record.is_due(now_ms) {
                report.not_due += 1;
                continue;
            }

            match self.close_for(symbol, record.due_ts()).await {
                PriceLookup::Found(close) => match record.settle(close, now_ms) {
                    Some(Outcome::Correct) => {
                        report.correct += 1;
                        report.changed += 1;
                    }
                    Some(_) => {
                        report.wrong += 1;
                        report.changed += 1;
                    }
                    None => {}
                },
                PriceLookup::Unavailable(reason) => {
                    warn!(
                        symbol = %symbol,
                        horizon = %record.horizon,
                        id = %record.id,
                        reason = %reason,
                        "No price for due forecast, leaving Pending"
                    );
                    report.unavailable += 1;
                }
            }
        }

        report
    }

    /// Load, resolve and rewrite one symbol/horizon store.
    ///
    /// The store is only rewritten when at least one record changed.
    pub async fn resolve_store(
        &self,
        store: &dyn RecordStore,
        symbol: &str,
        horizon: Horizon,
        now_ms: i64,
    ) -> Result<ResolutionReport> {
        let loaded = store.load(symbol, horizon)?;
        let mut records = loaded.records;
        let mut report = self.resolve_records(symbol, &mut records, now_ms).await;
        report.malformed = loaded.malformed;

        if report.changed > 0 {
            store.save(symbol, horizon, &records)?;
            info!(
                symbol = %symbol,
                horizon = %horizon,
                changed = report.changed,
                correct = report.correct,
                wrong = report.wrong,
                "✅ Forecasts resolved"
            );
        }

        Ok(report)
    }
}
