//! Bar loading for the runner.
//!
//! Given an instrument spec, loads its bars and reports where they came
//! from. Fallback policy:
//! 1. If the instrument has a path → read it (`.csv` or `.parquet`)
//! 2. If not and `synthetic` is enabled → generate synthetic bars (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Loading never reorders or repairs bars. Ordering and OHLCV sanity are
//! checked by the engine, which rejects the whole series.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{LazyFrame, PolarsError, ScanArgsParquet};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use wyckoff_core::data::{bars_from_frame, FrameError};
use wyckoff_core::synthetic::{accumulation_series, symbol_seed, FULL_SHAPE_BARS};
use wyckoff_core::{Bar, BarSeries};

use crate::config::InstrumentSpec;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data path for '{symbol}' (use --synthetic for synthetic data)")]
    NoData { symbol: String },

    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("parquet error in {path}: {source}")]
    Parquet { path: PathBuf, source: PolarsError },

    #[error("bad columns in {path}: {source}")]
    Frame { path: PathBuf, source: FrameError },

    #[error("unsupported file type: {0} (expected .csv or .parquet)")]
    UnsupportedFormat(PathBuf),
}

/// Where an instrument's bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Parquet,
    Synthetic,
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Generate synthetic bars for instruments without a path.
    pub synthetic: bool,
    /// Length of generated series.
    pub synthetic_bars: usize,
    /// Master seed; each symbol derives its own seed from it.
    pub seed: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            synthetic: false,
            synthetic_bars: FULL_SHAPE_BARS * 3,
            seed: 42,
        }
    }
}

/// A series plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: BarSeries,
    pub source: DataSource,
}

/// Load one instrument's bars according to the fallback policy.
pub fn load_series(spec: &InstrumentSpec, opts: &LoadOptions) -> Result<LoadedSeries, LoadError> {
    if let Some(path) = &spec.path {
        let (series, source) = match extension(path).as_deref() {
            Some("csv") => (read_csv(path, &spec.symbol)?, DataSource::Csv),
            Some("parquet") | Some("pq") => (read_parquet(path, &spec.symbol)?, DataSource::Parquet),
            _ => return Err(LoadError::UnsupportedFormat(path.clone())),
        };
        debug!(symbol = %spec.symbol, path = %path.display(), bars = series.len(), "loaded bars");
        return Ok(LoadedSeries { series, source });
    }

    if opts.synthetic {
        warn!(
            symbol = %spec.symbol,
            bars = opts.synthetic_bars,
            "generating synthetic data; results are tagged as synthetic"
        );
        let seed = symbol_seed(opts.seed, &spec.symbol);
        return Ok(LoadedSeries {
            series: accumulation_series(&spec.symbol, opts.synthetic_bars, seed),
            source: DataSource::Synthetic,
        });
    }

    Err(LoadError::NoData {
        symbol: spec.symbol.clone(),
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

// ── CSV ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "datetime")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Read `timestamp,open,high,low,close,volume` rows from a file.
pub fn read_csv(path: &Path, symbol: &str) -> Result<BarSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_from(file, symbol)
}

/// Read CSV bars from any reader. Extra columns are ignored.
pub fn read_csv_from<R: Read>(reader: R, symbol: &str) -> Result<BarSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(BarSeries::new(symbol, bars))
}

/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS` and bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Parquet ─────────────────────────────────────────────────────────

/// Read a Parquet file with the canonical bar columns.
pub fn read_parquet(path: &Path, symbol: &str) -> Result<BarSeries, LoadError> {
    let parquet_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())
        .map_err(parquet_err)?
        .collect()
        .map_err(parquet_err)?;

    bars_from_frame(&df, symbol).map_err(|source| LoadError::Frame {
        path: path.to_path_buf(),
        source,
    })
}
