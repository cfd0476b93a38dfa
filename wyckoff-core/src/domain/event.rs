//! Wyckoff events and the market context they belong to.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which side of the Wyckoff cycle the current structure is building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketContext {
    #[default]
    Undefined,
    Accumulation,
    Distribution,
}

/// Discrete Wyckoff event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // ── Accumulation ──
    /// Selling climax.
    Sc,
    /// Automatic rally.
    Ar,
    /// Secondary test of the selling climax.
    St,
    Spring,
    /// Low-volume test of a spring.
    Test,
    /// Sign of strength.
    Sos,
    /// Last point of support.
    Lps,
    /// Jump across the creek.
    Jac,

    // ── Distribution ──
    /// Buying climax.
    Bc,
    AutoReaction,
    /// Secondary test of the buying climax.
    StDist,
    /// Upthrust after distribution.
    Utad,
    /// Sign of weakness.
    Sow,
    /// Last point of supply.
    Lpsy,

    // ── Shared ──
    /// Upthrust: a failed push above resistance.
    Ut,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::Sc,
        EventKind::Ar,
        EventKind::St,
        EventKind::Spring,
        EventKind::Test,
        EventKind::Sos,
        EventKind::Lps,
        EventKind::Jac,
        EventKind::Bc,
        EventKind::AutoReaction,
        EventKind::StDist,
        EventKind::Utad,
        EventKind::Sow,
        EventKind::Lpsy,
        EventKind::Ut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Sc => "SC",
            EventKind::Ar => "AR",
            EventKind::St => "ST",
            EventKind::Spring => "SPRING",
            EventKind::Test => "TEST",
            EventKind::Sos => "SOS",
            EventKind::Lps => "LPS",
            EventKind::Jac => "JAC",
            EventKind::Bc => "BC",
            EventKind::AutoReaction => "AUTO_REACTION",
            EventKind::StDist => "ST_DIST",
            EventKind::Utad => "UTAD",
            EventKind::Sow => "SOW",
            EventKind::Lpsy => "LPSY",
            EventKind::Ut => "UT",
        }
    }

    /// SC and BC start a new structure.
    pub fn is_climax(&self) -> bool {
        matches!(self, EventKind::Sc | EventKind::Bc)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality tier of a spring, judged by its relative volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpringQuality {
    /// Volume at or above the breakout multiplier.
    TerminalShakeout,
    /// Above-average volume; wants a confirming test.
    NeedsTest,
    /// At or below average volume.
    HighQuality,
}

impl SpringQuality {
    pub fn classify(volume_spike_ratio: f64, breakout_vol_multiplier: f64) -> Self {
        if volume_spike_ratio >= breakout_vol_multiplier {
            SpringQuality::TerminalShakeout
        } else if volume_spike_ratio > 1.0 {
            SpringQuality::NeedsTest
        } else {
            SpringQuality::HighQuality
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpringQuality::TerminalShakeout => "terminal_shakeout",
            SpringQuality::NeedsTest => "needs_test",
            SpringQuality::HighQuality => "high_quality",
        }
    }
}

/// A detected Wyckoff event.
///
/// The envelope is fixed; type-specific extras (spring tier, divergence
/// flags, spike ratios) live in `details`, ordered for deterministic output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(
        kind: EventKind,
        bar_index: usize,
        timestamp: NaiveDateTime,
        price: f64,
        volume: f64,
    ) -> Self {
        Self {
            kind,
            bar_index,
            timestamp,
            price,
            volume,
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail entry (builder style).
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}
