//! Seeded synthetic bars with a textbook accumulation shape.
//!
//! Layout (bar indices): markdown 0..40, selling climax at 40, automatic
//! rally 41..=47, trading range 48..80, spring at 80, recovery 81..=85,
//! sign-of-strength breakout at 86, markup afterwards. Fewer than
//! `FULL_SHAPE_BARS` bars truncates the shape.
//!
//! Volume noise is kept within ±5% so that only the climax clears the
//! default climax multiplier and the breakout lands between the breakout
//! and climax multipliers.

use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, BarSeries};

/// Bars needed to contain the complete shape.
pub const FULL_SHAPE_BARS: usize = 100;

const CLIMAX: usize = 40;
const RALLY_END: usize = 47;
const SPRING: usize = 80;
const BREAKOUT: usize = 86;
const BASE_VOLUME: f64 = 1_000.0;

/// Derive a per-symbol seed from a master seed.
///
/// Hash based, so the seed for a symbol does not depend on which other
/// symbols are generated or in what order.
pub fn symbol_seed(master_seed: u64, symbol: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(first)
}

struct Generator {
    rng: StdRng,
    prev_close: f64,
    climax_low: f64,
    range_high: f64,
}

impl Generator {
    fn noise(&mut self, scale: f64) -> f64 {
        self.rng.gen_range(-scale..=scale)
    }

    fn volume(&mut self, mult: f64) -> f64 {
        BASE_VOLUME * mult * (1.0 + self.noise(0.05))
    }

    fn wick(&mut self) -> f64 {
        self.rng.gen_range(0.1..0.6)
    }

    /// Ordinary bar opening at the previous close.
    fn bar_to(&mut self, close: f64, volume: f64) -> (f64, f64, f64, f64, f64) {
        let open = self.prev_close;
        let high = open.max(close) + self.wick();
        let low = open.min(close) - self.wick();
        (open, high, low, close, volume)
    }

    fn next(&mut self, i: usize) -> (f64, f64, f64, f64, f64) {
        let ohlcv = match i {
            _ if i < CLIMAX => {
                let close = 120.0 - 0.5 * i as f64 + self.noise(0.3);
                let volume = self.volume(1.0);
                self.bar_to(close, volume)
            }
            CLIMAX => {
                let open = self.prev_close;
                let low = open - 8.0;
                self.climax_low = low;
                (open, open + 0.3, low, low + 1.0, BASE_VOLUME * 4.5)
            }
            _ if i <= RALLY_END => {
                let close = self.prev_close + 1.5 + self.noise(0.3);
                let volume = self.volume(1.3);
                self.bar_to(close, volume)
            }
            _ if i < SPRING => {
                let phase = (i - RALLY_END - 1) as f64 * 0.5;
                let close = 99.0 + 3.0 * phase.sin() + self.noise(0.3);
                let volume = self.volume(1.0);
                self.bar_to(close, volume)
            }
            SPRING => {
                let open = self.prev_close;
                let low = self.climax_low - 2.0;
                let close = self.climax_low + 2.0;
                (open, open.max(close) + 0.3, low, close, self.volume(1.1))
            }
            _ if i < BREAKOUT => {
                let close = self.prev_close + 1.2 + self.noise(0.3);
                let volume = self.volume(1.0);
                self.bar_to(close, volume)
            }
            BREAKOUT => {
                let open = self.prev_close;
                let close = self.range_high + 2.0;
                (open, close + 0.3, open - 0.3, close, BASE_VOLUME * 1.7)
            }
            _ => {
                let close = self.prev_close + 0.6 + self.noise(0.3);
                let volume = self.volume(1.0);
                self.bar_to(close, volume)
            }
        };

        if i > CLIMAX && i < BREAKOUT {
            self.range_high = self.range_high.max(ohlcv.1);
        }
        self.prev_close = ohlcv.3;
        ohlcv
    }
}

/// Generate `bars` daily bars for `symbol`, identical for identical seeds.
pub fn accumulation_series(symbol: &str, bars: usize, seed: u64) -> BarSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);

    let mut generator = Generator {
        rng: StdRng::seed_from_u64(seed),
        prev_close: 120.0,
        climax_low: f64::NAN,
        range_high: f64::MIN,
    };

    let series = (0..bars)
        .map(|i| {
            let (open, high, low, close, volume) = generator.next(i);
            Bar {
                timestamp: start + Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect();

    BarSeries::new(symbol, series)
}
