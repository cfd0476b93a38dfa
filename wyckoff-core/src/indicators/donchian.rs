//! Donchian channel: rolling highest high / lowest low.
//!
//! - Upper: max(high[t-period+1..=t])
//! - Lower: min(low[t-period+1..=t])
//!
//! The climax test needs the extreme of the bars *before* t; callers read
//! the value at t-1 for that.
//!
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn upper(period: usize) -> Self {
        Self::new(period, DonchianBand::Upper)
    }

    pub fn lower(period: usize) -> Self {
        Self::new(period, DonchianBand::Lower)
    }

    fn new(period: usize, band: DonchianBand) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        let label = match band {
            DonchianBand::Upper => "upper",
            DonchianBand::Lower => "lower",
        };
        Self {
            period,
            band,
            name: format!("donchian_{label}_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[(i + 1 - self.period)..=i];
            result[i] = match self.band {
                DonchianBand::Upper => extreme(window.iter().map(|b| b.high), f64::max),
                DonchianBand::Lower => extreme(window.iter().map(|b| b.low), f64::min),
            };
        }

        result
    }
}

/// Fold a window to its extreme, propagating NaN.
fn extreme(values: impl Iterator<Item = f64>, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc: Option<f64> = None;
    for v in values {
        if v.is_nan() {
            return f64::NAN;
        }
        acc = Some(acc.map_or(v, |a| pick(a, v)));
    }
    acc.unwrap_or(f64::NAN)
}
