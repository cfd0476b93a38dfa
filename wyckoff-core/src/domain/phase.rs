//! Wyckoff phase labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a Wyckoff structure, ordered from `Unknown` through `E`.
///
/// Inside one context the sequence never decreases; only a new climax drops
/// it back to `Unknown`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Phase {
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    A,
    B,
    C,
    D,
    E,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unknown => "UNKNOWN",
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
            Phase::D => "D",
            Phase::E => "E",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
