//! Record Persistence Module
//!
//! JSONL forecast stores (one file per symbol/horizon), JSON summary files and
//! CSV export. Layout under `data_dir`:
//!
//! ```text
//! {SYMBOL}/15m.jsonl      forecast records, one JSON object per line
//! {SYMBOL}/60m.jsonl
//! {SYMBOL}/summary.json   per-symbol window stats
//! summary.json            global summary, keyed by symbol
//! ```

use crate::error::{ForecastError, Result};
use crate::types::{ForecastRecord, Horizon};
use chrono::{TimeZone, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

/// Share of lines kept when a store file is rotated
const ROTATE_KEEP_RATIO: f64 = 0.8;
/// Summary key addressing the global summary
pub const GLOBAL_SUMMARY_KEY: &str = "*";

/// Records read from a store, plus how many lines were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRecords {
    pub records: Vec<ForecastRecord>,
    pub malformed: usize,
}

/// Forecast record store, one ordered sequence per symbol/horizon
#[cfg_attr(test, automock)]
pub trait RecordStore: Send + Sync {
    /// Records in insertion order. Malformed entries are skipped and counted.
    fn load(&self, symbol: &str, horizon: Horizon) -> Result<LoadedRecords>;

    /// Replace the whole sequence
    fn save(&self, symbol: &str, horizon: Horizon, records: &[ForecastRecord]) -> Result<()>;

    fn append(&self, symbol: &str, horizon: Horizon, record: &ForecastRecord) -> Result<()>;
}

/// Destination for computed summaries
#[cfg_attr(test, automock)]
pub trait SummarySink: Send + Sync {
    /// `key` is a symbol, or `GLOBAL_SUMMARY_KEY` for the global summary
    fn write_summary(&self, key: &str, summary: &serde_json::Value) -> Result<()>;
}

/// Parse JSONL text. Blank lines are ignored; unparsable lines are logged and counted.
pub fn parse_jsonl(text: &str, origin: &str) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ForecastRecord>(line) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                let err = ForecastError::MalformedRecord {
                    line: idx + 1,
                    reason: e.to_string(),
                };
                warn!(file = %origin, error = %err, "Skipping malformed record");
                loaded.malformed += 1;
            }
        }
    }
    loaded
}

/// Serialize records as JSONL with a trailing newline
pub fn to_jsonl(records: &[ForecastRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write via a sibling temp file and rename, so readers never see a partial file
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// JSONL files under `{data_dir}/{SYMBOL}/{h}m.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlRecordStore {
    data_dir: PathBuf,
    rotate_max_lines: usize,
}

impl JsonlRecordStore {
    pub fn new(data_dir: impl AsRef<Path>, rotate_max_lines: usize) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            rotate_max_lines,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, symbol: &str, horizon: Horizon) -> PathBuf {
        self.data_dir
            .join(symbol)
            .join(format!("{}m.jsonl", horizon.minutes()))
    }

    /// Keep the newest 80% of lines once the file exceeds `rotate_max_lines`.
    ///
    /// Returns the number of lines dropped.
    pub fn rotate_if_large(&self, path: &Path) -> Result<usize> {
        if self.rotate_max_lines == 0 || !path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(path)?;
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= self.rotate_max_lines {
            return Ok(0);
        }

        let keep = (self.rotate_max_lines as f64 * ROTATE_KEEP_RATIO).floor() as usize;
        let dropped = lines.len() - keep;
        let mut kept = lines[dropped..].join("\n");
        kept.push('\n');
        write_atomic(path, kept.as_bytes())?;

        info!(file = %path.display(), dropped, kept = keep, "🔄 Rotated forecast store");
        Ok(dropped)
    }
}

impl RecordStore for JsonlRecordStore {
    fn load(&self, symbol: &str, horizon: Horizon) -> Result<LoadedRecords> {
        let path = self.path_for(symbol, horizon);
        if !path.exists() {
            return Ok(LoadedRecords::default());
        }
        let text = fs::read_to_string(&path)?;
        Ok(parse_jsonl(&text, &path.display().to_string()))
    }

    fn save(&self, symbol: &str, horizon: Horizon, records: &[ForecastRecord]) -> Result<()> {
        let path = self.path_for(symbol, horizon);
        write_atomic(&path, to_jsonl(records)?.as_bytes())
    }

    fn append(&self, symbol: &str, horizon: Horizon, record: &ForecastRecord) -> Result<()> {
        let path = self.path_for(symbol, horizon);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        drop(file);

        self.rotate_if_large(&path)?;
        Ok(())
    }
}

/// Pretty JSON summaries under `data_dir`
#[derive(Debug, Clone)]
pub struct JsonSummarySink {
    data_dir: PathBuf,
}

impl JsonSummarySink {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        if key == GLOBAL_SUMMARY_KEY {
            self.data_dir.join("summary.json")
        } else {
            self.data_dir.join(key).join("summary.json")
        }
    }
}

impl SummarySink for JsonSummarySink {
    fn write_summary(&self, key: &str, summary: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        write_atomic(&self.path_for(key), json.as_bytes())
    }
}

/// Flat CSV row for one record
#[derive(Debug, Clone, Serialize)]
pub struct CsvRecordRow {
    pub symbol: String,
    pub id: String,
    pub t: i64,
    pub time: String,
    pub src: String,
    pub dir: String,
    pub conf: f64,
    pub range_lo: f64,
    pub range_hi: f64,
    pub price_lo: f64,
    pub price_hi: f64,
    pub base: f64,
    pub horizon: u32,
    pub outcome: String,
}

impl CsvRecordRow {
    pub fn new(symbol: &str, record: &ForecastRecord) -> Self {
        let time = Utc
            .timestamp_millis_opt(record.t)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        Self {
            symbol: symbol.to_string(),
            id: record.id.clone(),
            t: record.t,
            time,
            src: record.src.clone(),
            dir: record.dir.to_string(),
            conf: record.conf,
            range_lo: record.range.lo,
            range_hi: record.range.hi,
            price_lo: record.price_lo,
            price_hi: record.price_hi,
            base: record.base,
            horizon: record.horizon.minutes(),
            outcome: record.outcome.to_string(),
        }
    }
}

/// Write rows to `path`, header included. Returns the row count.
pub fn write_csv(path: &Path, rows: &[CsvRecordRow]) -> Result<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(file = %path.display(), rows = rows.len(), "📝 CSV export written");
    Ok(rows.len())
}
