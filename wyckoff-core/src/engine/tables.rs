//! Event-to-phase membership tables.
//!
//! Static and immutable: built at compile time, shared by every run.

use crate::domain::{EventKind, MarketContext, Phase};

/// Which events signal phases A, C and D for one side of the cycle.
#[derive(Debug)]
pub struct PhaseTable {
    pub context: MarketContext,
    pub phase_a: &'static [EventKind],
    pub phase_c: &'static [EventKind],
    pub phase_d: &'static [EventKind],
    /// The phase-A event that moves A to B.
    pub secondary_test: EventKind,
}

pub static ACCUMULATION: PhaseTable = PhaseTable {
    context: MarketContext::Accumulation,
    phase_a: &[EventKind::Sc, EventKind::Ar, EventKind::St],
    phase_c: &[EventKind::Spring, EventKind::Test],
    phase_d: &[EventKind::Sos, EventKind::Jac, EventKind::Lps],
    secondary_test: EventKind::St,
};

pub static DISTRIBUTION: PhaseTable = PhaseTable {
    context: MarketContext::Distribution,
    phase_a: &[EventKind::Bc, EventKind::AutoReaction, EventKind::StDist],
    phase_c: &[EventKind::Utad, EventKind::Ut],
    phase_d: &[EventKind::Sow, EventKind::Lpsy],
    secondary_test: EventKind::StDist,
};

impl PhaseTable {
    /// Table whose phase-A set contains `kind`.
    pub fn for_phase_a(kind: EventKind) -> Option<&'static PhaseTable> {
        [&ACCUMULATION, &DISTRIBUTION]
            .into_iter()
            .find(|table| table.phase_a.contains(&kind))
    }

    /// Phase this table assigns to `kind`, if any.
    pub fn phase_of(&self, kind: EventKind) -> Option<Phase> {
        if self.phase_a.contains(&kind) {
            Some(Phase::A)
        } else if self.phase_c.contains(&kind) {
            Some(Phase::C)
        } else if self.phase_d.contains(&kind) {
            Some(Phase::D)
        } else {
            None
        }
    }
}
