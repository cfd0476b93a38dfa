//! Analysis parameters.
//!
//! Read-only for the engine: `run_analysis` validates the config once at
//! entry and never mutates it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to a climax whose reaction (AR / AUTO_REACTION) never
/// arrives within `tr_max_duration` bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPolicy {
    /// Reset the context to undefined once the window has passed.
    #[default]
    Expire,
    /// Keep the context alive until a later climax resets it.
    Persist,
}

/// Detection parameters. Every field has a default, so a TOML table may
/// override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window of the volume average and of the climax low/high lookback.
    pub vol_lookback: usize,
    /// Window of the bar-range average.
    pub range_lookback: usize,
    /// Half-width of the swing-point window; also the divergence lookback.
    pub swing_point_n: usize,
    pub climax_vol_multiplier: f64,
    pub climax_range_multiplier: f64,
    pub breakout_vol_multiplier: f64,
    /// Bars after a climax within which the reaction must appear.
    pub tr_max_duration: usize,
    /// Max relative distance from the climax extreme for ST / ST_DIST and
    /// from support for TEST.
    pub secondary_test_tolerance: f64,
    /// Max relative distance from the broken boundary for LPS / LPSY.
    pub retest_tolerance: f64,
    pub stall_policy: StallPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            vol_lookback: 20,
            range_lookback: 20,
            swing_point_n: 5,
            climax_vol_multiplier: 2.0,
            climax_range_multiplier: 1.5,
            breakout_vol_multiplier: 1.5,
            tr_max_duration: 60,
            secondary_test_tolerance: 0.03,
            retest_tolerance: 0.05,
            stall_policy: StallPolicy::Expire,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("failed to parse analysis config: {0}")]
    Parse(String),
}

impl AnalysisConfig {
    /// Parse from a TOML document containing the config keys at top level.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Minimum series length needed before any structure can be detected.
    pub fn min_bars(&self) -> usize {
        self.vol_lookback + self.swing_point_n
    }

    /// First bar index the event detector evaluates.
    pub fn warmup_bars(&self) -> usize {
        self.vol_lookback.max(self.range_lookback)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_window("vol_lookback", self.vol_lookback)?;
        positive_window("range_lookback", self.range_lookback)?;
        positive_window("swing_point_n", self.swing_point_n)?;
        positive_window("tr_max_duration", self.tr_max_duration)?;
        positive_multiplier("climax_vol_multiplier", self.climax_vol_multiplier)?;
        positive_multiplier("climax_range_multiplier", self.climax_range_multiplier)?;
        positive_multiplier("breakout_vol_multiplier", self.breakout_vol_multiplier)?;
        fraction("secondary_test_tolerance", self.secondary_test_tolerance)?;
        fraction("retest_tolerance", self.retest_tolerance)?;
        Ok(())
    }
}

fn positive_window(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

fn positive_multiplier(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a finite positive number, got {value}"),
        });
    }
    Ok(())
}

fn fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must lie strictly between 0 and 1, got {value}"),
        });
    }
    Ok(())
}
