//! Reporting and export: JSON, CSV, Parquet and Markdown artifacts.
//!
//! Provides four export formats for analysis reports:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: the annotated chart, one row per input bar
//! - **Parquet**: the annotated chart as a typed polars frame
//! - **Markdown**: human-readable single-instrument and batch reports
//!
//! All persisted reports include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use polars::prelude::ParquetWriter;
use wyckoff_core::data::annotated_frame;
use wyckoff_core::{annotate_chart, AnalysisResult, BarSeries, Event};

use crate::config::ExportFormat;
use crate::runner::{AnalysisReport, InstrumentRun, SCHEMA_VERSION};

pub const REPORT_JSON: &str = "report.json";
pub const ANNOTATED_CSV: &str = "annotated.csv";
pub const ANNOTATED_PARQUET: &str = "annotated.parquet";
pub const REPORT_MD: &str = "report.md";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize an `AnalysisReport` to pretty JSON.
pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize an `AnalysisReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the annotated chart as CSV.
///
/// Columns: timestamp, open, high, low, close, volume, phase, events,
/// details. `events` is comma-joined (quoted by the writer) and `details`
/// is a JSON object keyed by event name; both are empty on quiet bars.
pub fn export_annotated_csv(series: &BarSeries, result: &AnalysisResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "timestamp", "open", "high", "low", "close", "volume", "phase", "events", "details",
    ])?;

    for row in annotate_chart(series, result) {
        let b = &row.bar;
        wtr.write_record([
            b.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
            row.phase.as_str().to_string(),
            row.events.unwrap_or_default(),
            row.details.map(|d| d.to_string()).unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet export ─────────────────────────────────────────────────

/// Write the annotated chart to a Parquet file.
pub fn write_annotated_parquet(
    path: &Path,
    series: &BarSeries,
    result: &AnalysisResult,
) -> Result<()> {
    let rows = annotate_chart(series, result);
    let mut df = annotated_frame(&rows).context("failed to build annotated dataframe")?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .context("failed to write annotated parquet")?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one instrument.
///
/// Creates a directory named `{symbol}_{dataset hash prefix}/` under
/// `output_dir` containing the requested formats:
/// - `report.json`: the full `AnalysisReport`
/// - `annotated.csv`: the annotated chart
/// - `annotated.parquet`: the annotated chart as a frame
/// - `report.md`: the Markdown report
///
/// Re-running on identical data overwrites the same directory.
/// Returns the path to the directory.
pub fn save_artifacts(
    run: &InstrumentRun,
    output_dir: &Path,
    formats: &[ExportFormat],
) -> Result<PathBuf> {
    let report = &run.report;
    let dirname = format!("{}_{}", report.symbol, report.dataset_hash.short());
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    for format in formats {
        let (name, contents) = match format {
            ExportFormat::Json => (REPORT_JSON, export_json(report)?),
            ExportFormat::Csv => (ANNOTATED_CSV, export_annotated_csv(&run.series, &report.result)?),
            ExportFormat::Markdown => (REPORT_MD, generate_report(report)),
            ExportFormat::Parquet => {
                let path = run_dir.join(ANNOTATED_PARQUET);
                write_annotated_parquet(&path, &run.series, &report.result)?;
                continue;
            }
        };
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir)
}

/// Load an `AnalysisReport` from an artifact directory's report.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<AnalysisReport> {
    let report_path = dir.join(REPORT_JSON);
    let json = std::fs::read_to_string(&report_path)
        .with_context(|| format!("failed to read {}", report_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single instrument.
pub fn generate_report(report: &AnalysisReport) -> String {
    let mut md = String::with_capacity(2048);
    let summary = &report.summary;

    md.push_str(&format!("# Wyckoff Analysis: {}\n\n", report.symbol));

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", report.symbol));
    if let (Some(first), Some(last)) = (report.first_timestamp, report.last_timestamp) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!("| Bars | {} |\n", report.bar_count));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    md.push_str(&format!("| Config Hash | {} |\n", report.config_hash));
    if report.is_synthetic() {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    // Current structure
    md.push_str("## Current Structure\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Phase | {} |\n", summary.current_phase));
    md.push_str(&format!("| Context | {:?} |\n", summary.context));
    if let Some(expiry) = &summary.expired {
        md.push_str(&format!(
            "| Expired | climax at bar {} reset at {} |\n",
            expiry.climax_bar, expiry.timestamp
        ));
    }
    match &summary.active_range {
        Some(range) => md.push_str(&format!(
            "| Active Range | {:.2} – {:.2} (since {}) |\n",
            range.support, range.resistance, range.start_timestamp
        )),
        None => md.push_str("| Active Range | none |\n"),
    }
    if let Some(event) = &summary.last_event {
        md.push_str(&format!(
            "| Last Event | {} at {} ({:.2}) |\n",
            event.kind, event.timestamp, event.price
        ));
    }
    md.push('\n');

    if report.result.events.is_empty() {
        md.push_str("No Wyckoff structure detected.\n");
        return md;
    }

    // Events
    md.push_str("## Events\n\n");
    md.push_str("| Bar | Timestamp | Event | Price | Volume |\n");
    md.push_str("| ---: | --- | --- | ---: | ---: |\n");
    for event in &report.result.events {
        md.push_str(&format_event_row(event));
    }
    md.push('\n');

    // Trading ranges
    if !report.result.trading_ranges.is_empty() {
        md.push_str("## Trading Ranges\n\n");
        md.push_str("| Context | Support | Resistance | Start | End |\n");
        md.push_str("| --- | ---: | ---: | --- | --- |\n");
        for range in &report.result.trading_ranges {
            md.push_str(&format!(
                "| {:?} | {:.2} | {:.2} | {} | {} |\n",
                range.context,
                range.support,
                range.resistance,
                range.start_timestamp,
                range
                    .end_timestamp
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "open".into()),
            ));
        }
        md.push('\n');
    }

    md
}

fn format_event_row(event: &Event) -> String {
    format!(
        "| {} | {} | {} | {:.2} | {:.0} |\n",
        event.bar_index, event.timestamp, event.kind, event.price, event.volume
    )
}

/// Generate a one-table Markdown overview of a batch.
pub fn generate_batch_report(reports: &[&AnalysisReport]) -> String {
    let mut md = String::with_capacity(512 + reports.len() * 96);

    md.push_str("# Wyckoff Batch Summary\n\n");
    md.push_str("| Symbol | Bars | Phase | Context | Events | Last Event |\n");
    md.push_str("| --- | ---: | --- | --- | ---: | --- |\n");
    for report in reports {
        let s = &report.summary;
        md.push_str(&format!(
            "| {}{} | {} | {} | {:?} | {} | {} |\n",
            report.symbol,
            if report.is_synthetic() { " (synthetic)" } else { "" },
            report.bar_count,
            s.current_phase,
            s.context,
            report.result.events.len(),
            s.last_event
                .as_ref()
                .map(|e| e.kind.to_string())
                .unwrap_or_else(|| "-".into()),
        ));
    }
    md
}
