//! Engine error taxonomy.
//!
//! `InvalidInput` and `Configuration` are raised at entry to `run_analysis`.
//! `InsufficientData` is raised by the dynamics calculator and recovered by
//! `run_analysis` as an empty result: "nothing found" is a normal outcome.

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::BarError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] BarError),

    #[error("insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}
