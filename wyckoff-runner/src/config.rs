//! Run file: analysis parameters, output settings and the instrument list.
//!
//! ```toml
//! [analysis]
//! vol_lookback = 20
//! stall_policy = "expire"
//!
//! [output]
//! dir = "results"
//! formats = ["json", "csv", "parquet", "markdown"]
//!
//! [[instruments]]
//! symbol = "SPY"
//! path = "data/spy.csv"
//! ```
//!
//! Every table is optional; `[analysis]` keys fall back to
//! `AnalysisConfig::default()` one by one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use wyckoff_core::{AnalysisConfig, ConfigError};

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read run file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse run file: {0}")]
    Parse(String),

    #[error(transparent)]
    Analysis(#[from] ConfigError),

    #[error("instrument symbol must not be empty")]
    EmptySymbol,

    #[error("instrument '{0}' is listed more than once")]
    DuplicateSymbol(String),

    #[error("output.formats must name at least one format")]
    NoFormats,
}

/// Artifact kinds written per instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// `report.json`: the full `AnalysisReport`.
    Json,
    /// `annotated.csv`: one row per bar with events and phase.
    Csv,
    /// `annotated.parquet`: the same rows as a typed frame.
    Parquet,
    /// `report.md`: human-readable summary and event table.
    Markdown,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Json,
        ExportFormat::Csv,
        ExportFormat::Parquet,
        ExportFormat::Markdown,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub formats: Vec<ExportFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            formats: ExportFormat::ALL.to_vec(),
        }
    }
}

/// One instrument to analyze. Without a `path` the instrument can only be
/// served by synthetic data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl InstrumentSpec {
    pub fn new(symbol: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            symbol: symbol.into(),
            path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
    pub instruments: Vec<InstrumentSpec>,
}

impl RunConfig {
    /// Parse and validate a run file from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| RunConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a run file. Relative instrument paths are resolved against the
    /// run file's directory.
    pub fn from_file(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;

        if let Some(base) = path.parent() {
            for instrument in &mut config.instruments {
                if let Some(p) = instrument.path.as_mut() {
                    if p.is_relative() {
                        *p = base.join(&*p);
                    }
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.analysis.validate()?;

        if self.output.formats.is_empty() {
            return Err(RunConfigError::NoFormats);
        }

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(RunConfigError::EmptySymbol);
            }
            if !seen.insert(instrument.symbol.as_str()) {
                return Err(RunConfigError::DuplicateSymbol(instrument.symbol.clone()));
            }
        }
        Ok(())
    }
}
