//! Mutable state threaded through one event-detection run, and the
//! de-duplicating event log it writes to.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::domain::{Event, EventKind, MarketContext, TradingRange};

/// Bar index and extreme price (low for SC, high for BC) of the climax that
/// started the current structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimaxMark {
    pub index: usize,
    pub price: f64,
}

/// State machine for one `detect_events` call.
///
/// Created fresh per run and never shared; two runs over the same series
/// cannot observe each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorState {
    pub context: MarketContext,
    pub climax: Option<ClimaxMark>,
    /// Bar of the AR / AUTO_REACTION that opened the range.
    pub last_reaction: Option<usize>,
    /// Bar of the SOS / SOW awaiting its LPS / LPSY.
    pub breakout: Option<usize>,
    /// Bar of the latest spring awaiting a TEST.
    pub last_spring: Option<usize>,
    /// Index into the run's trading-range list.
    pub open_range: Option<usize>,
}

impl DetectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.context != MarketContext::Undefined
    }

    /// Start a new structure at a climax bar. Any previous state is dropped.
    pub fn begin(&mut self, context: MarketContext, climax: ClimaxMark) {
        *self = Self {
            context,
            climax: Some(climax),
            ..Self::default()
        };
    }

    /// Drop back to undefined, closing the open range (if any) at `at`.
    pub fn reset(&mut self, ranges: &mut [TradingRange], at: NaiveDateTime) {
        if let Some(idx) = self.open_range {
            if let Some(range) = ranges.get_mut(idx) {
                range.close(at);
            }
        }
        *self = Self::default();
    }

    pub fn awaiting_reaction(&self) -> bool {
        self.is_active() && self.open_range.is_none()
    }
}

/// Chronological event list, de-duplicated by `(timestamp, kind)`.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    seen: HashSet<(NaiveDateTime, EventKind)>,
}

impl EventLog {
    /// Append an event. Returns false (and drops it) on a duplicate.
    pub fn push(&mut self, event: Event) -> bool {
        if !self.seen.insert((event.timestamp, event.kind)) {
            return false;
        }
        tracing::debug!(
            kind = %event.kind,
            bar = event.bar_index,
            timestamp = %event.timestamp,
            price = event.price,
            "event detected"
        );
        self.events.push(event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in chronological order (stable for same-bar events).
    pub fn into_sorted(mut self) -> Vec<Event> {
        self.events.sort_by_key(|e| e.bar_index);
        self.events
    }
}
