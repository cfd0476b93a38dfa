//! Wyckoff Core: domain types, market dynamics, swing points, event and
//! phase state machines.
//!
//! This crate contains the whole analysis engine:
//! - Domain types (bars, events, trading ranges, phases)
//! - Rolling indicators and per-bar market dynamics
//! - Swing point detection
//! - Dual-context event detector (accumulation / distribution)
//! - Phase classifier with gap filling
//! - Chart annotation and polars DataFrame adapters
//!
//! The engine is synchronous, deterministic and side-effect free apart
//! from `tracing` output: the same bars and config always give the same
//! result.

pub mod analysis;
pub mod annotate;
pub mod config;
pub mod data;
pub mod domain;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod swing;
pub mod synthetic;

pub use analysis::{run_analysis, AnalysisResult, AnalysisSummary};
pub use annotate::{annotate_chart, AnnotatedBar};
pub use config::{AnalysisConfig, ConfigError, StallPolicy};
pub use domain::{
    Bar, BarError, BarSeries, Event, EventKind, MarketContext, Phase, SpringQuality,
    TradingRange,
};
pub use engine::ContextExpiry;
pub use error::AnalysisError;
pub use fingerprint::{dataset_hash, Fingerprint};
