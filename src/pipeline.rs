//! Run orchestration - predict, evaluate, summarize, train, export
//!
//! Symbols are processed one after another with a short pause between them.
//! A failing symbol is logged and skipped; it never aborts the run.

use crate::config::AppConfig;
use crate::error::{ForecastError, Result};
use crate::ml_engine::{ForecastPredictor, ModelStore, TrainingPipeline};
use crate::oracle::{BarInterval, FallbackMarketData, MarketData};
use crate::persistence::{
    write_csv, CsvRecordRow, JsonSummarySink, JsonlRecordStore, RecordStore, SummarySink,
    GLOBAL_SUMMARY_KEY,
};
use crate::resolution::{OutcomeResolver, ResolutionReport};
use crate::summary::{GlobalSummary, HorizonRecords, WindowAggregator};
use crate::types::{Horizon, Outcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictReport {
    /// Records appended as Pending
    pub pending: usize,
    /// Records appended as No-Trade
    pub no_trade: usize,
    /// Horizons skipped because the slot already has a forecast
    pub skipped_slot: usize,
    /// Symbols that failed
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrainReport {
    pub trained: usize,
    /// Horizons with too few samples
    pub skipped: usize,
    pub failed: usize,
}

pub struct Pipeline {
    config: AppConfig,
    market: Box<dyn MarketData>,
    store: Box<dyn RecordStore>,
    sink: Box<dyn SummarySink>,
    models: ModelStore,
    predictor: ForecastPredictor,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        market: Box<dyn MarketData>,
        store: Box<dyn RecordStore>,
        sink: Box<dyn SummarySink>,
    ) -> Self {
        let models = ModelStore::new(&config.persistence.data_dir);
        let predictor = ForecastPredictor::new(config.policy.clone());
        Self {
            config,
            market,
            store,
            sink,
            models,
            predictor,
        }
    }

    /// Production wiring: REST market data, JSONL store, JSON summaries under `data_dir`
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let market = FallbackMarketData::from_config(&config.oracle)?;
        info!(sources = ?market.source_names(), "📡 Market data sources ready");
        let data_dir = config.persistence.data_dir.clone();
        let store = JsonlRecordStore::new(&data_dir, config.persistence.rotate_max_lines);
        let sink = JsonSummarySink::new(&data_dir);
        Ok(Self::new(config, Box::new(market), Box::new(store), Box::new(sink)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// One forecast per symbol and horizon, unless the horizon slot is already taken
    pub async fn predict(&self, horizons: &[Horizon], now_ms: i64) -> PredictReport {
        let mut report = PredictReport::default();
        if horizons.is_empty() {
            return report;
        }

        for symbol in &self.config.bot.symbols {
            match self.predict_symbol(symbol, horizons, now_ms, &mut report).await {
                Ok(()) => self.pause(self.config.pacing.symbol_delay_ms).await,
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "❌ Prediction failed");
                    report.failed += 1;
                    self.pause(self.config.pacing.error_delay_ms).await;
                }
            }
        }

        info!(
            pending = report.pending,
            no_trade = report.no_trade,
            skipped_slot = report.skipped_slot,
            failed = report.failed,
            "🏁 Predict run complete"
        );
        report
    }

    async fn predict_symbol(
        &self,
        symbol: &str,
        horizons: &[Horizon],
        now_ms: i64,
        report: &mut PredictReport,
    ) -> Result<()> {
        let mut open = Vec::with_capacity(horizons.len());
        for &horizon in horizons {
            let loaded = self.store.load(symbol, horizon)?;
            if ForecastPredictor::slot_open(loaded.records.last(), horizon, now_ms) {
                open.push(horizon);
            } else {
                info!(symbol = %symbol, horizon = %horizon, "⏭️ Slot already forecast");
                report.skipped_slot += 1;
            }
        }
        if open.is_empty() {
            return Ok(());
        }

        let mut bars = self
            .market
            .fetch_series(symbol, BarInterval::Minute1, self.config.oracle.series_len)
            .await?;
        // Drop the still-forming bar
        bars.pop();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        for horizon in open {
            let model = self.models.scoring_model(symbol, horizon);
            let record = self
                .predictor
                .forecast(symbol, horizon, &closes, &model, now_ms)?;
            self.store.append(symbol, horizon, &record)?;

            match record.outcome {
                Outcome::NoTrade => report.no_trade += 1,
                _ => report.pending += 1,
            }
            info!(
                symbol = %symbol,
                horizon = %horizon,
                model = model.name(),
                dir = %record.dir,
                conf = record.conf,
                outcome = %record.outcome,
                "✅ Forecast recorded"
            );
        }
        Ok(())
    }

    /// Resolve due Pending forecasts across every symbol and horizon
    pub async fn evaluate(&self, now_ms: i64) -> ResolutionReport {
        let resolver = OutcomeResolver::new(self.market.as_ref(), self.config.oracle.close_tolerance_ms);
        let mut total = ResolutionReport::default();

        for symbol in &self.config.bot.symbols {
            let mut symbol_failed = false;
            for horizon in self.config.horizons() {
                match resolver
                    .resolve_store(self.store.as_ref(), symbol, horizon, now_ms)
                    .await
                {
                    Ok(report) => total.merge(&report),
                    Err(e) => {
                        error!(symbol = %symbol, horizon = %horizon, error = %e, "❌ Evaluation failed");
                        symbol_failed = true;
                    }
                }
            }
            let delay = if symbol_failed {
                self.config.pacing.error_delay_ms
            } else {
                self.config.pacing.symbol_delay_ms
            };
            self.pause(delay).await;
        }

        info!(
            changed = total.changed,
            correct = total.correct,
            wrong = total.wrong,
            unavailable = total.unavailable,
            not_due = total.not_due,
            malformed = total.malformed,
            "🏁 Evaluate run complete"
        );
        total
    }

    /// Records per symbol; a symbol whose store cannot be read is left out
    fn load_all(&self) -> BTreeMap<String, HorizonRecords> {
        let mut by_symbol = BTreeMap::new();
        for symbol in &self.config.bot.symbols {
            let mut per_horizon = HorizonRecords::new();
            for horizon in self.config.horizons() {
                match self.store.load(symbol, horizon) {
                    Ok(loaded) => {
                        per_horizon.insert(horizon, loaded.records);
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, horizon = %horizon, error = %e, "Store unreadable");
                    }
                }
            }
            by_symbol.insert(symbol.clone(), per_horizon);
        }
        by_symbol
    }

    /// Compute window stats and write one summary per symbol plus the global one
    pub fn summarize(&self, now_ms: i64) -> Result<GlobalSummary> {
        let aggregator =
            WindowAggregator::from_hours(&self.config.summary.windows_hours, self.config.horizons());
        let by_symbol = self.load_all();
        let global = aggregator.summarize_all(&by_symbol, now_ms);

        for (symbol, summary) in &global {
            let value = serde_json::to_value(summary)?;
            if let Err(e) = self.sink.write_summary(symbol, &value) {
                error!(symbol = %symbol, error = %e, "❌ Summary write failed");
            }
        }
        self.sink
            .write_summary(GLOBAL_SUMMARY_KEY, &serde_json::to_value(&global)?)?;

        let combined = aggregator.summarize_combined(&by_symbol, now_ms);
        for window in aggregator.windows() {
            if let Some(summary) = combined.get(&window.label) {
                info!(window = %window.label, hits = ?summary.hits, "📊 Overall hit rate");
            }
        }
        Ok(global)
    }

    /// Fit and save a model per symbol/horizon from `days` of 1-minute history
    pub async fn train(&self, days: u32, now_ms: i64) -> TrainReport {
        let trainer = TrainingPipeline::new(self.config.training.clone());
        let mut report = TrainReport::default();
        let start_ms = now_ms - days as i64 * DAY_MS;

        for symbol in &self.config.bot.symbols {
            info!(symbol = %symbol, days, "🎓 Training");
            let bars = match self.market.fetch_history(symbol, start_ms, now_ms).await {
                Ok(bars) => bars,
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "❌ History fetch failed");
                    report.failed += 1;
                    self.pause(self.config.pacing.error_delay_ms).await;
                    continue;
                }
            };

            for horizon in self.config.horizons() {
                let Some(model) = trainer.fit(symbol, horizon, &bars) else {
                    report.skipped += 1;
                    continue;
                };
                match self.models.save(symbol, horizon, &model) {
                    Ok(_) => report.trained += 1,
                    Err(e) => {
                        error!(symbol = %symbol, horizon = %horizon, error = %e, "❌ Model save failed");
                        report.failed += 1;
                    }
                }
            }
            self.pause(self.config.pacing.symbol_delay_ms).await;
        }
        report
    }

    /// Flatten every configured store into one CSV
    pub fn export(&self, out: &Path) -> Result<usize> {
        let rows: Vec<CsvRecordRow> = self
            .load_all()
            .iter()
            .flat_map(|(symbol, per_horizon)| {
                per_horizon
                    .values()
                    .flatten()
                    .map(move |record| CsvRecordRow::new(symbol, record))
            })
            .collect();
        if rows.is_empty() {
            return Err(ForecastError::unavailable("*", "no records to export"));
        }
        write_csv(out, &rows)
    }
}
