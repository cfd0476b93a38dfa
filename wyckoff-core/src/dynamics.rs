//! Market dynamics: per-bar volume/range spike ratios and price-volume
//! divergence.
//!
//! Computed once per run from precomputed SMA series; read-only afterward.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::domain::Bar;
use crate::error::AnalysisError;
use crate::indicators::{Indicator, Sma};

/// Price-volume divergence flag, serialized as -1 / 0 / +1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Divergence {
    /// New high on lower volume.
    Bearish,
    #[default]
    None,
    /// New low on lower volume.
    Bullish,
}

impl From<Divergence> for i8 {
    fn from(d: Divergence) -> i8 {
        match d {
            Divergence::Bearish => -1,
            Divergence::None => 0,
            Divergence::Bullish => 1,
        }
    }
}

impl TryFrom<i8> for Divergence {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Divergence::Bearish),
            0 => Ok(Divergence::None),
            1 => Ok(Divergence::Bullish),
            other => Err(format!("divergence must be -1, 0 or 1, got {other}")),
        }
    }
}

/// Derived per-bar dynamics, aligned with the bar series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub rolling_volume_avg: Option<f64>,
    pub range: f64,
    pub rolling_range_avg: Option<f64>,
    /// Current volume over its rolling average; 1.0 when undefined.
    pub volume_spike_ratio: f64,
    /// Current range over its rolling average; 1.0 when undefined.
    pub range_spike_ratio: f64,
    pub pv_divergence: Divergence,
}

/// Compute dynamics for every bar.
///
/// Fails with `InsufficientData` when the series is shorter than
/// `vol_lookback + swing_point_n`.
pub fn compute_dynamics(
    bars: &[Bar],
    config: &AnalysisConfig,
) -> Result<Vec<Dynamics>, AnalysisError> {
    let required = config.min_bars();
    if bars.len() < required {
        return Err(AnalysisError::InsufficientData {
            required,
            actual: bars.len(),
        });
    }

    let vol_avg = Sma::volume(config.vol_lookback).compute(bars);
    let range_avg = Sma::range(config.range_lookback).compute(bars);

    let dynamics = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (rolling_volume_avg, volume_spike_ratio) = spike_ratio(bar.volume, vol_avg[i]);
            let (rolling_range_avg, range_spike_ratio) = spike_ratio(bar.range(), range_avg[i]);
            Dynamics {
                rolling_volume_avg,
                range: bar.range(),
                rolling_range_avg,
                volume_spike_ratio,
                range_spike_ratio,
                pv_divergence: divergence_at(bars, i, config.swing_point_n),
            }
        })
        .collect();

    Ok(dynamics)
}

/// Ratio of `value` to `avg`, neutral 1.0 when the average is undefined
/// (warm-up NaN) or zero.
fn spike_ratio(value: f64, avg: f64) -> (Option<f64>, f64) {
    if !avg.is_finite() {
        return (None, 1.0);
    }
    if avg <= 0.0 {
        return (Some(avg), 1.0);
    }
    (Some(avg), (value / avg).max(0.0))
}

/// Divergence of bar `i` against the `n` bars before it.
fn divergence_at(bars: &[Bar], i: usize, n: usize) -> Divergence {
    if i < n || n == 0 {
        return Divergence::None;
    }
    let window = &bars[i - n..i];
    let bar = &bars[i];

    // First occurrence wins on ties.
    let lowest = window
        .iter()
        .fold(&window[0], |acc, b| if b.low < acc.low { b } else { acc });
    let highest = window
        .iter()
        .fold(&window[0], |acc, b| if b.high > acc.high { b } else { acc });

    let bullish = bar.low < lowest.low && bar.volume < lowest.volume;
    let bearish = bar.high > highest.high && bar.volume < highest.volume;

    match (bullish, bearish) {
        (true, false) => Divergence::Bullish,
        (false, true) => Divergence::Bearish,
        // An outside bar making both extremes is ambiguous.
        _ => Divergence::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            vol_lookback: 4,
            range_lookback: 4,
            swing_point_n: 2,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn short_series_is_insufficient() {
        let bars = make_bars(&[10.0; 5]);
        let err = compute_dynamics(&bars, &small_config()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                required: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn warmup_ratios_are_neutral() {
        let bars = make_bars(&[10.0; 8]);
        let dynamics = compute_dynamics(&bars, &small_config()).unwrap();
        for d in &dynamics[..3] {
            assert_eq!(d.rolling_volume_avg, None);
            assert_eq!(d.volume_spike_ratio, 1.0);
            assert_eq!(d.range_spike_ratio, 1.0);
        }
        assert_eq!(dynamics[3].rolling_volume_avg, Some(1000.0));
    }

    #[test]
    fn volume_spike_ratio_against_trailing_average() {
        let mut bars = make_bars(&[10.0; 8]);
        bars[6].volume = 5000.0;
        let dynamics = compute_dynamics(&bars, &small_config()).unwrap();
        // avg over bars 3..=6 = (1000*3 + 5000) / 4 = 2000
        assert_approx(dynamics[6].volume_spike_ratio, 2.5, DEFAULT_EPSILON);
        assert_approx(dynamics[5].volume_spike_ratio, 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_volume_average_stays_neutral() {
        let mut bars = make_bars(&[10.0; 8]);
        for b in &mut bars {
            b.volume = 0.0;
        }
        let dynamics = compute_dynamics(&bars, &small_config()).unwrap();
        assert!(dynamics.iter().all(|d| d.volume_spike_ratio == 1.0));
    }

    #[test]
    fn bullish_divergence_on_lower_low_with_less_volume() {
        let mut bars = make_bars(&[10.0; 8]);
        bars[5].low = 8.0;
        bars[5].volume = 2000.0;
        bars[6].low = 7.5;
        bars[6].volume = 1500.0;
        let dynamics = compute_dynamics(&bars, &small_config()).unwrap();
        assert_eq!(dynamics[6].pv_divergence, Divergence::Bullish);
        // bar 5 made its low on higher volume than the prior minimum
        assert_eq!(dynamics[5].pv_divergence, Divergence::None);
    }

    #[test]
    fn bearish_divergence_on_higher_high_with_less_volume() {
        let mut bars = make_bars(&[10.0; 8]);
        bars[5].high = 12.0;
        bars[5].volume = 3000.0;
        bars[6].high = 12.5;
        bars[6].volume = 900.0;
        let dynamics = compute_dynamics(&bars, &small_config()).unwrap();
        assert_eq!(dynamics[6].pv_divergence, Divergence::Bearish);
    }

    #[test]
    fn divergence_serializes_as_signed_integer() {
        assert_eq!(serde_json::to_string(&Divergence::Bearish).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Divergence::Bullish).unwrap(), "1");
        let parsed: Divergence = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Divergence::None);
        assert!(serde_json::from_str::<Divergence>("2").is_err());
    }
}
