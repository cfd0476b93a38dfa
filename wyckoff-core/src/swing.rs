//! Swing point detection over a symmetric window.
//!
//! Bar `i` is a swing high when its high exceeds every high in the `n` bars
//! before it and is `>=` every high in the `n` bars after it. Equal highs
//! therefore resolve to the first bar of a flat top. Swing lows mirror this
//! on lows. Only interior bars (`n <= i < len - n`) qualify.
//!
//! Note this looks `n` bars ahead: a swing at `i` is only known at `i + n`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Swing point indices into the bar series, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingPoints {
    pub highs: Vec<usize>,
    pub lows: Vec<usize>,
}

impl SwingPoints {
    pub fn is_high(&self, index: usize) -> bool {
        self.highs.binary_search(&index).is_ok()
    }

    pub fn is_low(&self, index: usize) -> bool {
        self.lows.binary_search(&index).is_ok()
    }

    pub fn high_timestamps(&self, bars: &[Bar]) -> Vec<NaiveDateTime> {
        self.highs.iter().map(|&i| bars[i].timestamp).collect()
    }

    pub fn low_timestamps(&self, bars: &[Bar]) -> Vec<NaiveDateTime> {
        self.lows.iter().map(|&i| bars[i].timestamp).collect()
    }
}

pub fn detect_swing_points(bars: &[Bar], n: usize) -> SwingPoints {
    let mut swings = SwingPoints::default();
    if n == 0 || bars.len() < 2 * n + 1 {
        return swings;
    }

    for i in n..bars.len() - n {
        let before = &bars[i - n..i];
        let after = &bars[i + 1..=i + n];
        let bar = &bars[i];

        if before.iter().all(|b| bar.high > b.high) && after.iter().all(|b| bar.high >= b.high) {
            swings.highs.push(i);
        }
        if before.iter().all(|b| bar.low < b.low) && after.iter().all(|b| bar.low <= b.low) {
            swings.lows.push(i);
        }
    }

    swings
}
