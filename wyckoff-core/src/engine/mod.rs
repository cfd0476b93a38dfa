//! Wyckoff state machines.
//!
//! The event detector consumes dynamics and swing points and emits events
//! plus trading ranges; the phase classifier folds those events into one
//! phase per bar. Both passes are strictly sequential over time.

pub mod detector;
pub mod phase;
pub mod state;
pub mod tables;

pub use detector::{detect_events, ContextExpiry, Detection};
pub use phase::{classify_phases, PhaseMachine};
pub use state::{ClimaxMark, DetectorState, EventLog};
pub use tables::{PhaseTable, ACCUMULATION, DISTRIBUTION};
