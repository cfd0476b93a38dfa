//! Run fingerprinting: deterministic identification of inputs.
//!
//! Two reports with equal dataset and config hashes carry equal results:
//! the engine is a pure function of the bars and the config.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{AnalysisConfig, StallPolicy};
use crate::domain::Bar;

/// BLAKE3 digest, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    fn from_hasher(hasher: &blake3::Hasher) -> Self {
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of the bar contents: timestamps in milliseconds plus the raw
/// little-endian bits of every OHLCV value. The symbol is not included.
pub fn dataset_hash(bars: &[Bar]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(bars.len() as u64).to_le_bytes());
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp_millis().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    Fingerprint::from_hasher(&hasher)
}

impl AnalysisConfig {
    /// Hash of every detection parameter.
    pub fn config_hash(&self) -> Fingerprint {
        // exhaustive destructuring: a new field must be hashed to compile
        let AnalysisConfig {
            vol_lookback,
            range_lookback,
            swing_point_n,
            climax_vol_multiplier,
            climax_range_multiplier,
            breakout_vol_multiplier,
            tr_max_duration,
            secondary_test_tolerance,
            retest_tolerance,
            stall_policy,
        } = self;

        let mut hasher = blake3::Hasher::new();
        for count in [vol_lookback, range_lookback, swing_point_n, tr_max_duration] {
            hasher.update(&(*count as u64).to_le_bytes());
        }
        for value in [
            climax_vol_multiplier,
            climax_range_multiplier,
            breakout_vol_multiplier,
            secondary_test_tolerance,
            retest_tolerance,
        ] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.update(match stall_policy {
            StallPolicy::Expire => &b"expire"[..],
            StallPolicy::Persist => &b"persist"[..],
        });
        Fingerprint::from_hasher(&hasher)
    }
}
