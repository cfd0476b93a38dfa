//! Simple Moving Average (SMA) over a selectable bar field.
//!
//! Trailing window that includes the current bar.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Bar;

/// Bar field an SMA averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarField {
    Close,
    Volume,
    /// high - low
    Range,
}

impl BarField {
    pub fn extract(&self, bar: &Bar) -> f64 {
        match self {
            BarField::Close => bar.close,
            BarField::Volume => bar.volume,
            BarField::Range => bar.range(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BarField::Close => "close",
            BarField::Volume => "volume",
            BarField::Range => "range",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    field: BarField,
    name: String,
}

impl Sma {
    pub fn new(field: BarField, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            field,
            name: format!("sma_{}_{period}", field.label()),
        }
    }

    pub fn volume(period: usize) -> Self {
        Self::new(BarField::Volume, period)
    }

    pub fn range(period: usize) -> Self {
        Self::new(BarField::Range, period)
    }
}

impl Indicator for Sma {
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

        let values: Vec<f64> = bars.iter().map(|b| self.field.extract(b)).collect();

        let mut sum: f64 = values[..self.period].iter().sum();
        result[self.period - 1] = sum / self.period as f64;

        for i in self.period..n {
            sum += values[i] - values[i - self.period];
            if sum.is_nan() {
                // A NaN poisons the running sum; rescan the window instead.
                sum = values[(i + 1 - self.period)..=i].iter().sum();
            }
            result[i] = sum / self.period as f64;
        }

        result
    }
}
