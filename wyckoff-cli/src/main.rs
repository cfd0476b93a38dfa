//! Wyckoff CLI: analyze, batch, and synthetic data commands.
//!
//! Commands:
//! - `analyze`: label one instrument (CSV/Parquet file or synthetic bars)
//! - `batch`: analyze every instrument of a TOML run file in parallel
//! - `synthetic`: write a seeded synthetic accumulation series as CSV
//!
//! Logging goes to stderr; set `RUST_LOG` to override the default
//! `wyckoff=info` filter.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wyckoff_core::synthetic::{accumulation_series, symbol_seed, FULL_SHAPE_BARS};
use wyckoff_core::AnalysisResult;
use wyckoff_runner::export::{export_annotated_csv, export_json, generate_batch_report};
use wyckoff_runner::{
    run_batch, run_instrument, save_artifacts, AnalysisReport, ExportFormat, InstrumentSpec,
    LoadOptions, RunConfig,
};

const DEFAULT_SEED: u64 = 42;
const BATCH_SUMMARY: &str = "summary.md";

#[derive(Parser)]
#[command(
    name = "wyckoff",
    about = "Wyckoff CLI: event and phase detection over OHLCV bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one instrument and save its artifacts.
    Analyze {
        /// CSV or Parquet file with timestamp,open,high,low,close,volume.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Symbol label. Defaults to the input file stem.
        #[arg(long)]
        symbol: Option<String>,

        /// Run file whose [analysis] and [output] tables apply.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Generate synthetic bars when no --input is given.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Master seed for synthetic bars.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Output directory. Overrides the run file's [output] dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Artifact formats (json, csv, parquet, markdown). Repeatable.
        #[arg(long = "format", value_parser = parse_format)]
        formats: Vec<ExportFormat>,

        /// Print the full report as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Analyze every instrument listed in a run file.
    Batch {
        /// Path to the TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Serve instruments without a path from synthetic bars.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Master seed for synthetic bars.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Worker threads. Defaults to one per core.
        #[arg(long)]
        threads: Option<usize>,

        /// Output directory. Overrides the run file's [output] dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write a synthetic accumulation series as CSV.
    Synthetic {
        /// Symbol label; also salts the seed.
        #[arg(long, default_value = "SYN")]
        symbol: String,

        /// Number of bars.
        #[arg(long, default_value_t = FULL_SHAPE_BARS * 3)]
        bars: usize,

        /// Master seed.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Destination CSV file.
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            symbol,
            config,
            synthetic,
            seed,
            output_dir,
            formats,
            json,
        } => run_analyze_cmd(
            input, symbol, config, synthetic, seed, output_dir, formats, json,
        ),
        Commands::Batch {
            config,
            synthetic,
            seed,
            threads,
            output_dir,
        } => run_batch_cmd(&config, synthetic, seed, threads, output_dir),
        Commands::Synthetic {
            symbol,
            bars,
            seed,
            output,
        } => run_synthetic_cmd(&symbol, bars, seed, &output),
    }
}

fn init_logging() -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("wyckoff=info"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

fn parse_format(text: &str) -> Result<ExportFormat, String> {
    match text.to_ascii_lowercase().as_str() {
        "json" => Ok(ExportFormat::Json),
        "csv" => Ok(ExportFormat::Csv),
        "parquet" => Ok(ExportFormat::Parquet),
        "md" | "markdown" => Ok(ExportFormat::Markdown),
        other => Err(format!(
            "unknown format '{other}'. Valid: json, csv, parquet, markdown"
        )),
    }
}

fn load_run_file(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load run file {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_analyze_cmd(
    input: Option<PathBuf>,
    symbol: Option<String>,
    config_path: Option<PathBuf>,
    synthetic: bool,
    seed: u64,
    output_dir: Option<PathBuf>,
    formats: Vec<ExportFormat>,
    json: bool,
) -> Result<()> {
    if input.is_none() && !synthetic {
        bail!("one of --input or --synthetic is required");
    }

    let run_config = load_run_file(config_path.as_deref())?;
    let symbol = match (symbol, &input) {
        (Some(symbol), _) => symbol,
        (None, Some(path)) => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_uppercase())
            .context("cannot derive a symbol from --input; pass --symbol")?,
        (None, None) => "SYN".to_string(),
    };

    let spec = InstrumentSpec::new(symbol, input);
    let opts = LoadOptions {
        synthetic,
        seed,
        ..LoadOptions::default()
    };
    let run = run_instrument(&spec, &run_config.analysis, &opts)?;

    if json {
        println!("{}", export_json(&run.report)?);
    } else {
        print_summary(&run.report);
    }

    let formats = if formats.is_empty() {
        run_config.output.formats.clone()
    } else {
        formats
    };
    let output_dir = output_dir.unwrap_or(run_config.output.dir);
    let run_dir = save_artifacts(&run, &output_dir, &formats)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_batch_cmd(
    config_path: &Path,
    synthetic: bool,
    seed: u64,
    threads: Option<usize>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let run_config = load_run_file(Some(config_path))?;
    if run_config.instruments.is_empty() {
        bail!("run file lists no [[instruments]]");
    }

    let opts = LoadOptions {
        synthetic,
        seed,
        ..LoadOptions::default()
    };
    let outcome = run_batch(&run_config.instruments, &run_config.analysis, &opts, threads)?;

    let output_dir = output_dir.unwrap_or(run_config.output.dir);
    for run in &outcome.runs {
        let run_dir = save_artifacts(run, &output_dir, &run_config.output.formats)?;
        info!(symbol = %run.report.symbol, dir = %run_dir.display(), "artifacts saved");
    }

    let reports: Vec<&AnalysisReport> = outcome.runs.iter().map(|r| &r.report).collect();
    let summary = generate_batch_report(&reports);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let summary_path = output_dir.join(BATCH_SUMMARY);
    std::fs::write(&summary_path, &summary)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    print!("{summary}");

    if !outcome.all_succeeded() {
        for failure in &outcome.failures {
            eprintln!("Error for {}: {}", failure.symbol, failure.error);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_synthetic_cmd(symbol: &str, bars: usize, seed: u64, output: &Path) -> Result<()> {
    let series = accumulation_series(symbol, bars, symbol_seed(seed, symbol));
    let csv = export_annotated_csv(&series, &AnalysisResult::default())?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, csv).with_context(|| format!("failed to write {}", output.display()))?;

    println!("Wrote {} synthetic bars for {symbol} to {}", series.len(), output.display());
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let summary = &report.summary;
    println!();
    println!("=== Wyckoff Analysis ===");
    println!("Symbol:         {}", report.symbol);
    if let (Some(first), Some(last)) = (report.first_timestamp, report.last_timestamp) {
        println!("Period:         {first} to {last}");
    }
    println!("Bars:           {}", report.bar_count);
    println!("Dataset:        {}", report.dataset_hash.short());
    println!("Config:         {}", report.config_hash.short());
    println!();
    println!("--- Structure ---");
    println!("Phase:          {}", summary.current_phase);
    println!("Context:        {:?}", summary.context);
    if let Some(expiry) = &summary.expired {
        println!(
            "Expired:        climax at bar {} reset at {}",
            expiry.climax_bar, expiry.timestamp
        );
    }
    match &summary.active_range {
        Some(range) => println!(
            "Active Range:   {:.2} - {:.2} (since {})",
            range.support, range.resistance, range.start_timestamp
        ),
        None => println!("Active Range:   none"),
    }
    println!("Ranges:         {}", report.result.trading_ranges.len());
    println!("Events:         {}", report.result.events.len());
    for (kind, count) in &summary.event_counts {
        println!("  {:<14}{count}", kind.as_str());
    }
    if let Some(event) = &summary.last_event {
        println!(
            "Last Event:     {} at {} ({:.2})",
            event.kind, event.timestamp, event.price
        );
    }
    if report.is_synthetic() {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
