//! Phase classifier: folds the chronological event list into one phase
//! label per bar.
//!
//! Transitions within a context:
//! - UNKNOWN → A on a phase-A event (fixes accumulation or distribution)
//! - A → B on the secondary test (ST / ST_DIST)
//! - A → C, A → D, B → D: abbreviated cycles, taken directly
//! - B → C, C → D
//! - D absorbs everything until a reset
//!
//! A new SC/BC while the phase is not UNKNOWN resets the machine and is then
//! processed as the first event of the new structure.

use tracing::debug;

use crate::domain::{Bar, Event, EventKind, MarketContext, Phase};

use super::tables::PhaseTable;

/// Phase state machine for one classification pass.
#[derive(Debug, Default)]
pub struct PhaseMachine {
    phase: Phase,
    table: Option<&'static PhaseTable>,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> MarketContext {
        self.table
            .map_or(MarketContext::Undefined, |table| table.context)
    }

    pub fn apply(&mut self, kind: EventKind) {
        if kind.is_climax() && self.phase != Phase::Unknown {
            debug!(climax = %kind, from = %self.phase, "phase context reset");
            *self = Self::default();
        }

        let Some(table) = self.table else {
            if let Some(table) = PhaseTable::for_phase_a(kind) {
                self.table = Some(table);
                self.phase = Phase::A;
            }
            return;
        };

        let Some(member) = table.phase_of(kind) else {
            return;
        };

        let next = match (self.phase, member) {
            (Phase::A, Phase::A) if kind == table.secondary_test => Phase::B,
            (Phase::A | Phase::B, Phase::C) => Phase::C,
            (Phase::A | Phase::B | Phase::C, Phase::D) => Phase::D,
            (current, _) => current,
        };

        if next != self.phase {
            if next == Phase::D && self.phase < Phase::C {
                debug!(from = %self.phase, event = %kind, "abbreviated cycle straight to phase D");
            }
            self.phase = next;
        }
    }
}

/// Assign a phase to every bar.
///
/// Events at a bar update the phase at that bar; bars between events hold
/// the phase in force before the later event. Bars before the first event
/// are UNKNOWN.
pub fn classify_phases(bars: &[Bar], events: &[Event]) -> Vec<Phase> {
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut machine = PhaseMachine::new();
    let mut cursor = 0;
    let mut phases = Vec::with_capacity(bars.len());

    for bar in bars {
        while let Some(event) = ordered.get(cursor).filter(|e| e.timestamp <= bar.timestamp) {
            machine.apply(event.kind);
            cursor += 1;
        }
        phases.push(machine.phase());
    }

    phases
}
