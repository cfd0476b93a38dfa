//! Bar, the fundamental market data unit, and the series that owns them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single instrument at a single timestamp.
///
/// Bars are immutable once ingested. Everything downstream of the series
/// refers to a bar by its index (and timestamp), never by a mutated copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// High-low span of the bar.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if any OHLCV field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: finite values, high >= low, high >= open, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}

/// Reasons a bar series violates the input contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar series for '{0}' is empty")]
    Empty(String),

    #[error("bar {index} ({timestamp}) has missing or inconsistent OHLCV values")]
    Insane {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("timestamps not strictly ascending at bar {index} ({timestamp})")]
    Unordered {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Ordered OHLCV history for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        self.bars.get(index).map(|b| b.timestamp)
    }

    /// Check the input contract: non-empty, every bar sane, timestamps
    /// strictly ascending (which also makes them unique).
    pub fn validate(&self) -> Result<(), BarError> {
        if self.bars.is_empty() {
            return Err(BarError::Empty(self.symbol.clone()));
        }
        for (index, bar) in self.bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(BarError::Insane {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if index > 0 && bar.timestamp <= self.bars[index - 1].timestamp {
                return Err(BarError::Unordered {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(())
    }
}
