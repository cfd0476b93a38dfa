//! Wyckoff Runner: run files, bar loading, batch analysis and export.
//!
//! This crate builds on `wyckoff-core` to provide:
//! - Run files (TOML) naming analysis parameters, outputs and instruments
//! - Bar loading from CSV or Parquet with a tagged synthetic fallback
//! - Per-instrument reports with dataset and config fingerprints
//! - Parallel batch analysis with per-instrument failure isolation
//! - JSON / CSV / Parquet / Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{ExportFormat, InstrumentSpec, OutputConfig, RunConfig, RunConfigError};
pub use data_loader::{load_series, DataSource, LoadError, LoadOptions, LoadedSeries};
pub use export::{
    export_annotated_csv, export_json, generate_batch_report, generate_report, import_json,
    load_artifacts, save_artifacts, write_annotated_parquet,
};
pub use runner::{
    analyze_series, run_batch, run_instrument, AnalysisReport, BatchFailure, BatchOutcome,
    InstrumentRun, RunError, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn analysis_report_is_send_sync() {
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
    }

    #[test]
    fn instrument_run_is_send_sync() {
        assert_send::<InstrumentRun>();
        assert_sync::<InstrumentRun>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }
}
