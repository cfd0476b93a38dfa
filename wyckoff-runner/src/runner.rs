//! Analysis runner: wires together loading, the engine and fingerprints.
//!
//! Three entry points:
//! - `analyze_series()`: takes a loaded series. No I/O.
//! - `run_instrument()`: loads one instrument, then analyzes it.
//! - `run_batch()`: every instrument of a run file, in parallel (rayon).
//!   One engine call per instrument; a failing instrument does not stop
//!   the others.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use wyckoff_core::{
    dataset_hash, run_analysis, AnalysisConfig, AnalysisError, AnalysisResult, AnalysisSummary,
    BarSeries, Fingerprint,
};

use crate::config::{InstrumentSpec, RunConfigError};
use crate::data_loader::{load_series, DataSource, LoadError, LoadOptions};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] RunConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("analysis of '{symbol}' failed: {source}")]
    Analysis {
        symbol: String,
        source: AnalysisError,
    },
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete, self-describing outcome of one instrument's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub source: DataSource,
    pub bar_count: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub dataset_hash: Fingerprint,
    pub config_hash: Fingerprint,
    pub config: AnalysisConfig,
    pub result: AnalysisResult,
    pub summary: AnalysisSummary,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl AnalysisReport {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

/// Analyze a loaded series. No I/O.
pub fn analyze_series(
    series: &BarSeries,
    source: DataSource,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RunError> {
    let result = run_analysis(series, config).map_err(|source| RunError::Analysis {
        symbol: series.symbol.clone(),
        source,
    })?;
    let summary = result.summary();

    Ok(AnalysisReport {
        schema_version: SCHEMA_VERSION,
        symbol: series.symbol.clone(),
        source,
        bar_count: series.len(),
        first_timestamp: series.bars.first().map(|b| b.timestamp),
        last_timestamp: series.bars.last().map(|b| b.timestamp),
        dataset_hash: dataset_hash(&series.bars),
        config_hash: config.config_hash(),
        config: config.clone(),
        result,
        summary,
    })
}

/// A loaded series and its report, kept together for export.
#[derive(Debug, Clone)]
pub struct InstrumentRun {
    pub series: BarSeries,
    pub report: AnalysisReport,
}

/// Load and analyze one instrument.
pub fn run_instrument(
    spec: &InstrumentSpec,
    config: &AnalysisConfig,
    opts: &LoadOptions,
) -> Result<InstrumentRun, RunError> {
    let loaded = load_series(spec, opts)?;
    let report = analyze_series(&loaded.series, loaded.source, config)?;
    Ok(InstrumentRun {
        series: loaded.series,
        report,
    })
}

/// An instrument that could not be analyzed.
#[derive(Debug)]
pub struct BatchFailure {
    pub symbol: String,
    pub error: RunError,
}

/// Outcome of a batch, in instrument order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub runs: Vec<InstrumentRun>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Analyze every instrument in parallel.
///
/// `threads` caps the pool size; `None` uses rayon's global pool.
pub fn run_batch(
    instruments: &[InstrumentSpec],
    config: &AnalysisConfig,
    opts: &LoadOptions,
    threads: Option<usize>,
) -> Result<BatchOutcome, RunError> {
    config.validate().map_err(RunConfigError::from)?;

    let analyze_all = || -> Vec<Result<InstrumentRun, BatchFailure>> {
        instruments
            .par_iter()
            .map(|spec| {
                run_instrument(spec, config, opts).map_err(|error| BatchFailure {
                    symbol: spec.symbol.clone(),
                    error,
                })
            })
            .collect()
    };

    let results = match threads {
        Some(n) if n > 0 => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(analyze_all),
        _ => analyze_all(),
    };

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Ok(run) => outcome.runs.push(run),
            Err(failure) => {
                warn!(symbol = %failure.symbol, error = %failure.error, "instrument failed");
                outcome.failures.push(failure);
            }
        }
    }

    info!(
        succeeded = outcome.runs.len(),
        failed = outcome.failures.len(),
        "batch complete"
    );
    Ok(outcome)
}
