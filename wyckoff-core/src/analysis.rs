//! `run_analysis`: the engine entry point.
//!
//! Pipeline: validate → dynamics → swing points → event detector → phase
//! classifier. Structural problems (bad config, bad bars) are errors; a
//! series too short to analyze is an empty result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span};

use crate::config::AnalysisConfig;
use crate::domain::{BarSeries, Event, EventKind, MarketContext, Phase, TradingRange};
use crate::dynamics::compute_dynamics;
use crate::engine::{classify_phases, detect_events, ContextExpiry, PhaseMachine};
use crate::error::AnalysisError;
use crate::swing::detect_swing_points;

/// Phases (one per bar), events and trading ranges of one run.
///
/// All three are empty when the series was too short to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub phases: Vec<Phase>,
    pub events: Vec<Event>,
    pub trading_ranges: Vec<TradingRange>,
    /// Climaxes that stalled and expired without a reaction.
    #[serde(default)]
    pub expiries: Vec<ContextExpiry>,
}

/// Where the structure stands at the last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub current_phase: Phase,
    pub context: MarketContext,
    pub active_range: Option<TradingRange>,
    pub last_event: Option<Event>,
    pub event_counts: BTreeMap<EventKind, usize>,
    /// Set when the latest climax expired; `context` is then undefined.
    #[serde(default)]
    pub expired: Option<ContextExpiry>,
}

impl AnalysisResult {
    /// True when no structure was detected at all.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.trading_ranges.is_empty()
    }

    pub fn summary(&self) -> AnalysisSummary {
        let mut machine = PhaseMachine::new();
        let mut event_counts = BTreeMap::new();
        for event in &self.events {
            machine.apply(event.kind);
            *event_counts.entry(event.kind).or_insert(0) += 1;
        }

        let expired = self
            .events
            .iter()
            .rev()
            .find(|e| e.kind.is_climax())
            .and_then(|climax| {
                self.expiries
                    .iter()
                    .find(|x| x.climax_bar == climax.bar_index)
                    .copied()
            });
        let context = match expired {
            Some(_) => MarketContext::Undefined,
            None => machine.context(),
        };

        AnalysisSummary {
            current_phase: self.phases.last().copied().unwrap_or_default(),
            context,
            active_range: self.trading_ranges.iter().rev().find(|r| r.is_open()).cloned(),
            last_event: self.events.last().cloned(),
            event_counts,
            expired,
        }
    }
}

/// Analyze one instrument's bar series.
pub fn run_analysis(
    series: &BarSeries,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    config.validate()?;
    series.validate()?;

    let _span = info_span!("run_analysis", symbol = %series.symbol, bars = series.len()).entered();
    let bars = &series.bars;

    let dynamics = match compute_dynamics(bars, config) {
        Ok(dynamics) => dynamics,
        Err(AnalysisError::InsufficientData { required, actual }) => {
            debug!(required, actual, "series too short; no structure detected");
            return Ok(AnalysisResult::default());
        }
        Err(e) => return Err(e),
    };
    let swings = detect_swing_points(bars, config.swing_point_n);
    let detection = detect_events(bars, &dynamics, &swings, config);
    let phases = classify_phases(bars, &detection.events);

    info!(
        events = detection.events.len(),
        trading_ranges = detection.trading_ranges.len(),
        expiries = detection.expiries.len(),
        swing_highs = swings.highs.len(),
        swing_lows = swings.lows.len(),
        "analysis complete"
    );

    Ok(AnalysisResult {
        phases,
        events: detection.events,
        trading_ranges: detection.trading_ranges,
        expiries: detection.expiries,
    })
}
