//! Event detector: the dual-context Wyckoff state machine.
//!
//! One chronological pass over the bars after warm-up. Per bar:
//! 1. Climax check: a qualifying SC/BC resets any active context and starts
//!    a new structure on the same bar.
//! 2. Reaction search: the first swing high (accumulation) or swing low
//!    (distribution) after the climax opens the trading range, unless
//!    `tr_max_duration` has passed (stall policy). An expired climax is
//!    reported in `Detection::expiries`.
//! 3. In-range analysis: springs, tests, breakouts and their retests.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AnalysisConfig, StallPolicy};
use crate::domain::{Bar, Event, EventKind, MarketContext, SpringQuality, TradingRange};
use crate::dynamics::{Divergence, Dynamics};
use crate::indicators::{Donchian, Indicator};
use crate::swing::SwingPoints;

use super::state::{ClimaxMark, DetectorState, EventLog};

/// Output of one detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub events: Vec<Event>,
    pub trading_ranges: Vec<TradingRange>,
    /// Climaxes dropped under `StallPolicy::Expire`, in bar order.
    pub expiries: Vec<ContextExpiry>,
}

/// A climax whose context expired before any reaction opened a range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextExpiry {
    pub climax_bar: usize,
    /// First bar past `tr_max_duration`, where the context reset.
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
}

/// Read-only inputs shared by every step of the loop.
struct Inputs<'a> {
    bars: &'a [Bar],
    dynamics: &'a [Dynamics],
    swings: &'a SwingPoints,
    config: &'a AnalysisConfig,
    /// Rolling min low / max high over `vol_lookback`, current bar included.
    lowest_low: Vec<f64>,
    highest_high: Vec<f64>,
}

/// Run the event state machine.
///
/// A series shorter than `vol_lookback + swing_point_n` (or dynamics that do
/// not line up with the bars) yields an empty `Detection`.
pub fn detect_events(
    bars: &[Bar],
    dynamics: &[Dynamics],
    swings: &SwingPoints,
    config: &AnalysisConfig,
) -> Detection {
    if bars.len() < config.min_bars() || dynamics.len() != bars.len() {
        return Detection::default();
    }

    let inputs = Inputs {
        bars,
        dynamics,
        swings,
        config,
        lowest_low: Donchian::lower(config.vol_lookback).compute(bars),
        highest_high: Donchian::upper(config.vol_lookback).compute(bars),
    };

    let mut state = DetectorState::new();
    let mut log = EventLog::default();
    let mut ranges: Vec<TradingRange> = Vec::new();
    let mut expiries: Vec<ContextExpiry> = Vec::new();

    for i in config.warmup_bars()..bars.len() {
        let bar = &bars[i];

        // ─── Step 1: Climax ───
        if let Some(kind) = inputs.climax_at(i) {
            if state.is_active() {
                debug!(
                    bar = i,
                    from = ?state.context,
                    climax = %kind,
                    "new climax resets active context"
                );
                state.reset(&mut ranges, bar.timestamp);
            }
            let (context, event) = inputs.climax_event(kind, i);
            log.push(event);
            state.begin(
                context,
                ClimaxMark {
                    index: i,
                    price: match context {
                        MarketContext::Distribution => bar.high,
                        _ => bar.low,
                    },
                },
            );
            continue;
        }

        if !state.is_active() {
            continue;
        }

        // ─── Step 2: Reaction ───
        if state.awaiting_reaction() {
            if let Some(expiry) = inputs.seek_reaction(i, &mut state, &mut log, &mut ranges) {
                expiries.push(expiry);
            }
            continue;
        }

        // ─── Step 3: In-range analysis ───
        let Some(range) = state.open_range.and_then(|idx| ranges.get(idx)) else {
            continue;
        };
        let (support, resistance) = (range.support, range.resistance);
        match state.context {
            MarketContext::Accumulation => {
                inputs.accumulation_bar(i, support, resistance, &mut state, &mut log)
            }
            MarketContext::Distribution => {
                inputs.distribution_bar(i, support, resistance, &mut state, &mut log)
            }
            MarketContext::Undefined => {}
        }
    }

    Detection {
        events: log.into_sorted(),
        trading_ranges: ranges,
        expiries,
    }
}

/// `value` lies within `tolerance` (relative) of `reference`.
fn within(value: f64, reference: f64, tolerance: f64) -> bool {
    (value - reference).abs() <= reference.abs() * tolerance
}

impl Inputs<'_> {
    /// SC when the bar closes at or below the prior window's lowest low on a
    /// volume and range spike; BC mirrors on the highest high.
    fn climax_at(&self, i: usize) -> Option<EventKind> {
        if i == 0 {
            return None;
        }
        let bar = &self.bars[i];
        let d = &self.dynamics[i];
        let spiking = d.volume_spike_ratio > self.config.climax_vol_multiplier
            && d.range_spike_ratio > self.config.climax_range_multiplier;
        if !spiking {
            return None;
        }

        let prior_low = self.lowest_low[i - 1];
        let prior_high = self.highest_high[i - 1];
        if prior_low.is_finite() && bar.close <= prior_low {
            Some(EventKind::Sc)
        } else if prior_high.is_finite() && bar.close >= prior_high {
            Some(EventKind::Bc)
        } else {
            None
        }
    }

    fn climax_event(&self, kind: EventKind, i: usize) -> (MarketContext, Event) {
        let bar = &self.bars[i];
        let d = &self.dynamics[i];
        let (context, price, flag, flagged) = match kind {
            EventKind::Bc => (
                MarketContext::Distribution,
                bar.high,
                "bearish_divergence",
                d.pv_divergence == Divergence::Bearish,
            ),
            _ => (
                MarketContext::Accumulation,
                bar.low,
                "bullish_divergence",
                d.pv_divergence == Divergence::Bullish,
            ),
        };
        let event = Event::new(kind, i, bar.timestamp, price, bar.volume)
            .with_detail("volume_spike_ratio", d.volume_spike_ratio)
            .with_detail("range_spike_ratio", d.range_spike_ratio)
            .with_detail(flag, flagged);
        (context, event)
    }

    fn seek_reaction(
        &self,
        i: usize,
        state: &mut DetectorState,
        log: &mut EventLog,
        ranges: &mut Vec<TradingRange>,
    ) -> Option<ContextExpiry> {
        let climax = state.climax?;
        let elapsed = i - climax.index;
        if elapsed > self.config.tr_max_duration {
            if self.config.stall_policy == StallPolicy::Persist {
                return None;
            }
            debug!(
                bar = i,
                climax_bar = climax.index,
                "no reaction within tr_max_duration; context expired"
            );
            let timestamp = self.bars[i].timestamp;
            state.reset(ranges, timestamp);
            return Some(ContextExpiry {
                climax_bar: climax.index,
                bar_index: i,
                timestamp,
            });
        }

        let bar = &self.bars[i];
        let start = self.bars[climax.index].timestamp;
        let (kind, price, range) = match state.context {
            MarketContext::Accumulation if self.swings.is_high(i) => (
                EventKind::Ar,
                bar.high,
                TradingRange::open(climax.price, bar.high, start, MarketContext::Accumulation),
            ),
            MarketContext::Distribution if self.swings.is_low(i) => (
                EventKind::AutoReaction,
                bar.low,
                TradingRange::open(bar.low, climax.price, start, MarketContext::Distribution),
            ),
            _ => return None,
        };
        let range = range?;

        log.push(
            Event::new(kind, i, bar.timestamp, price, bar.volume)
                .with_detail("bars_from_climax", elapsed)
                .with_detail("support", range.support)
                .with_detail("resistance", range.resistance),
        );
        ranges.push(range);
        state.open_range = Some(ranges.len() - 1);
        state.last_reaction = Some(i);
        None
    }

    fn accumulation_bar(
        &self,
        i: usize,
        support: f64,
        resistance: f64,
        state: &mut DetectorState,
        log: &mut EventLog,
    ) {
        let bar = &self.bars[i];
        let d = &self.dynamics[i];
        let cfg = self.config;

        // A pending breakout only looks for its retest.
        if let Some(breakout) = state.breakout {
            if i > breakout
                && d.volume_spike_ratio < 1.0
                && within(bar.low, resistance, cfg.retest_tolerance)
            {
                log.push(
                    Event::new(EventKind::Lps, i, bar.timestamp, bar.low, bar.volume)
                        .with_detail("bars_since_breakout", i - breakout)
                        .with_detail("volume_spike_ratio", d.volume_spike_ratio),
                );
                state.breakout = None;
            }
            return;
        }

        if bar.close > resistance && d.volume_spike_ratio > cfg.breakout_vol_multiplier {
            log.push(
                Event::new(EventKind::Sos, i, bar.timestamp, bar.close, bar.volume)
                    .with_detail("volume_spike_ratio", d.volume_spike_ratio),
            );
            log.push(
                Event::new(EventKind::Jac, i, bar.timestamp, bar.close, bar.volume)
                    .with_detail("resistance", resistance),
            );
            state.breakout = Some(i);
            return;
        }

        if bar.low < support && bar.close > support {
            let quality = SpringQuality::classify(d.volume_spike_ratio, cfg.breakout_vol_multiplier);
            log.push(
                Event::new(EventKind::Spring, i, bar.timestamp, bar.low, bar.volume)
                    .with_detail("quality", quality.as_str())
                    .with_detail("volume_spike_ratio", d.volume_spike_ratio)
                    .with_detail("penetration", support - bar.low),
            );
            state.last_spring = Some(i);
            return;
        }

        if let Some(climax) = state.climax {
            if d.pv_divergence == Divergence::Bullish
                && within(bar.low, climax.price, cfg.secondary_test_tolerance)
            {
                log.push(
                    Event::new(EventKind::St, i, bar.timestamp, bar.low, bar.volume)
                        .with_detail("climax_low", climax.price)
                        .with_detail("volume_spike_ratio", d.volume_spike_ratio),
                );
                return;
            }
        }

        if let Some(spring) = state.last_spring {
            if i > spring
                && d.volume_spike_ratio <= 1.0
                && bar.low >= support
                && bar.low <= support * (1.0 + cfg.secondary_test_tolerance)
            {
                log.push(
                    Event::new(EventKind::Test, i, bar.timestamp, bar.low, bar.volume)
                        .with_detail("spring_bar", spring)
                        .with_detail("volume_spike_ratio", d.volume_spike_ratio),
                );
                state.last_spring = None;
                return;
            }
        }

        if bar.high > resistance && bar.close < resistance {
            log.push(
                Event::new(EventKind::Ut, i, bar.timestamp, bar.high, bar.volume)
                    .with_detail("volume_spike_ratio", d.volume_spike_ratio),
            );
        }
    }

    fn distribution_bar(
        &self,
        i: usize,
        support: f64,
        resistance: f64,
        state: &mut DetectorState,
        log: &mut EventLog,
    ) {
        let bar = &self.bars[i];
        let d = &self.dynamics[i];
        let cfg = self.config;

        if let Some(breakout) = state.breakout {
            if i > breakout
                && d.volume_spike_ratio < 1.0
                && within(bar.high, support, cfg.retest_tolerance)
                && bar.close < support
            {
                log.push(
                    Event::new(EventKind::Lpsy, i, bar.timestamp, bar.high, bar.volume)
                        .with_detail("bars_since_breakdown", i - breakout)
                        .with_detail("volume_spike_ratio", d.volume_spike_ratio),
                );
                state.breakout = None;
            }
            return;
        }

        if bar.close < support && d.volume_spike_ratio > cfg.breakout_vol_multiplier {
            log.push(
                Event::new(EventKind::Sow, i, bar.timestamp, bar.close, bar.volume)
                    .with_detail("volume_spike_ratio", d.volume_spike_ratio)
                    .with_detail("support", support),
            );
            state.breakout = Some(i);
            return;
        }

        if bar.high > resistance && bar.close < resistance {
            log.push(
                Event::new(EventKind::Utad, i, bar.timestamp, bar.high, bar.volume)
                    .with_detail("volume_spike_ratio", d.volume_spike_ratio)
                    .with_detail("penetration", bar.high - resistance),
            );
            return;
        }

        if let Some(climax) = state.climax {
            if d.pv_divergence == Divergence::Bearish
                && within(bar.high, climax.price, cfg.secondary_test_tolerance)
            {
                log.push(
                    Event::new(EventKind::StDist, i, bar.timestamp, bar.high, bar.volume)
                        .with_detail("climax_high", climax.price)
                        .with_detail("volume_spike_ratio", d.volume_spike_ratio),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::compute_dynamics;
    use crate::swing::detect_swing_points;
    use chrono::NaiveDate;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            vol_lookback: 10,
            range_lookback: 10,
            swing_point_n: 3,
            tr_max_duration: 20,
            ..AnalysisConfig::default()
        }
    }

    /// Flat bars: open = close = 100, high 101, low 99, volume 1000.
    fn flat(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    fn set(bars: &mut [Bar], i: usize, ohlcv: (f64, f64, f64, f64, f64)) {
        let (open, high, low, close, volume) = ohlcv;
        bars[i].open = open;
        bars[i].high = high;
        bars[i].low = low;
        bars[i].close = close;
        bars[i].volume = volume;
    }

    fn run(bars: &[Bar], config: &AnalysisConfig) -> Detection {
        let dynamics = compute_dynamics(bars, config).unwrap();
        let swings = detect_swing_points(bars, config.swing_point_n);
        detect_events(bars, &dynamics, &swings, config)
    }

    fn kinds(detection: &Detection) -> Vec<(usize, EventKind)> {
        detection
            .events
            .iter()
            .map(|e| (e.bar_index, e.kind))
            .collect()
    }

    /// Selling climax at 15, rally peaking at 18.
    fn selling_climax_fixture() -> Vec<Bar> {
        let mut bars = flat(60);
        set(&mut bars, 15, (99.0, 100.0, 89.0, 90.0, 5000.0));
        set(&mut bars, 16, (90.0, 96.0, 90.0, 95.0, 1500.0));
        set(&mut bars, 17, (95.0, 102.0, 94.0, 101.0, 1200.0));
        set(&mut bars, 18, (101.0, 105.0, 99.0, 103.0, 1100.0));
        set(&mut bars, 19, (103.0, 103.0, 99.0, 100.0, 1000.0));
        bars
    }

    #[test]
    fn selling_climax_then_automatic_rally() {
        let bars = selling_climax_fixture();
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![(15, EventKind::Sc), (18, EventKind::Ar)]
        );
        let range = &detection.trading_ranges[0];
        assert_eq!(range.support, 89.0);
        assert_eq!(range.resistance, 105.0);
        assert_eq!(range.start_timestamp, bars[15].timestamp);
        assert_eq!(range.context, MarketContext::Accumulation);
        assert!(range.is_open());
    }

    #[test]
    fn buying_climax_then_automatic_reaction() {
        let mut bars = flat(60);
        set(&mut bars, 15, (101.0, 111.0, 100.0, 110.0, 5000.0));
        set(&mut bars, 16, (110.0, 110.0, 104.0, 105.0, 1500.0));
        set(&mut bars, 17, (105.0, 106.0, 98.0, 99.0, 1200.0));
        set(&mut bars, 18, (99.0, 101.0, 95.0, 97.0, 1100.0));
        set(&mut bars, 19, (97.0, 101.0, 97.0, 100.0, 1000.0));
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![(15, EventKind::Bc), (18, EventKind::AutoReaction)]
        );
        let range = &detection.trading_ranges[0];
        assert_eq!(range.support, 95.0);
        assert_eq!(range.resistance, 111.0);
        assert_eq!(range.context, MarketContext::Distribution);
    }

    #[test]
    fn spring_and_breakout_inside_range() {
        let mut bars = selling_climax_fixture();
        // undercut support (89) and close back inside on quiet volume
        set(&mut bars, 30, (99.0, 100.0, 88.0, 95.0, 900.0));
        // close above resistance (105) on 1.8x volume, below the BC spike
        set(&mut bars, 40, (100.0, 107.0, 100.0, 106.0, 2000.0));
        let detection = run(&bars, &config());
        let events = kinds(&detection);

        assert!(events.contains(&(30, EventKind::Spring)));
        assert!(events.contains(&(40, EventKind::Sos)));
        assert!(events.contains(&(40, EventKind::Jac)));
        let spring = detection
            .events
            .iter()
            .find(|e| e.kind == EventKind::Spring)
            .unwrap();
        assert_eq!(spring.details["quality"], "high_quality");
    }

    #[test]
    fn new_climax_resets_context_and_closes_range() {
        let mut bars = selling_climax_fixture();
        // second selling climax well below the first
        set(&mut bars, 40, (99.0, 99.0, 80.0, 81.0, 6000.0));
        let detection = run(&bars, &config());

        assert!(kinds(&detection).contains(&(40, EventKind::Sc)));
        assert_eq!(
            detection.trading_ranges[0].end_timestamp,
            Some(bars[40].timestamp)
        );
    }

    #[test]
    fn quiet_retest_after_spring_is_a_test() {
        let mut bars = selling_climax_fixture();
        set(&mut bars, 30, (99.0, 100.0, 88.0, 95.0, 900.0));
        // holds just above support (89) on light volume
        set(&mut bars, 33, (100.0, 101.0, 90.0, 100.0, 900.0));
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![
                (15, EventKind::Sc),
                (18, EventKind::Ar),
                (30, EventKind::Spring),
                (33, EventKind::Test),
            ]
        );
        let test = &detection.events[3];
        assert_eq!(test.details["spring_bar"], 30);
        assert_eq!(test.price, 90.0);
    }

    #[test]
    fn failed_push_above_resistance_is_upthrust() {
        let mut bars = selling_climax_fixture();
        // pokes above resistance (105) and closes back inside on normal volume
        set(&mut bars, 35, (100.0, 107.0, 99.0, 102.0, 1000.0));
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![(15, EventKind::Sc), (18, EventKind::Ar), (35, EventKind::Ut)]
        );
        assert_eq!(detection.events[2].price, 107.0);
    }

    #[test]
    fn heavy_volume_spring_is_terminal_shakeout() {
        let mut bars = selling_climax_fixture();
        // ratio 1800 / 1080 clears the breakout multiplier but not the climax one
        set(&mut bars, 30, (99.0, 100.0, 88.0, 95.0, 1800.0));
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![(15, EventKind::Sc), (18, EventKind::Ar), (30, EventKind::Spring)]
        );
        let spring = &detection.events[2];
        assert_eq!(spring.details["quality"], "terminal_shakeout");
        assert_eq!(spring.details["penetration"], 1.0);
    }

    /// Selling climax at 15; the first swing high (45) comes after the
    /// 20-bar reaction window.
    fn stalled_climax_fixture() -> Vec<Bar> {
        let mut bars = flat(60);
        set(&mut bars, 15, (99.0, 100.0, 89.0, 90.0, 5000.0));
        set(&mut bars, 45, (100.0, 106.0, 99.0, 100.0, 1000.0));
        bars
    }

    #[test]
    fn stalled_climax_expires_by_default() {
        let bars = stalled_climax_fixture();
        let detection = run(&bars, &config());

        assert_eq!(kinds(&detection), vec![(15, EventKind::Sc)]);
        assert!(detection.trading_ranges.is_empty());
        assert_eq!(
            detection.expiries,
            vec![ContextExpiry {
                climax_bar: 15,
                bar_index: 36,
                timestamp: bars[36].timestamp,
            }]
        );
    }

    #[test]
    fn stalled_climax_persists_when_configured() {
        let bars = stalled_climax_fixture();
        let cfg = AnalysisConfig {
            stall_policy: StallPolicy::Persist,
            ..config()
        };
        let detection = run(&bars, &cfg);

        assert_eq!(kinds(&detection), vec![(15, EventKind::Sc)]);
        assert!(detection.trading_ranges.is_empty());
        assert!(detection.expiries.is_empty());
    }

    #[test]
    fn climax_after_expiry_starts_fresh_structure() {
        let mut bars = stalled_climax_fixture();
        set(&mut bars, 50, (99.0, 99.0, 80.0, 81.0, 6000.0));
        let detection = run(&bars, &config());

        assert_eq!(
            kinds(&detection),
            vec![(15, EventKind::Sc), (50, EventKind::Sc)]
        );
        assert_eq!(detection.expiries.len(), 1);
        assert_eq!(detection.expiries[0].climax_bar, 15);
    }

    #[test]
    fn neutral_series_detects_nothing() {
        let detection = run(&flat(60), &config());
        assert!(detection.events.is_empty());
        assert!(detection.trading_ranges.is_empty());
    }

    #[test]
    fn short_series_is_empty() {
        let bars = flat(8);
        let detection = detect_events(&bars, &[], &SwingPoints::default(), &config());
        assert_eq!(detection, Detection::default());
    }

    #[test]
    fn within_is_relative() {
        assert!(within(97.0, 100.0, 0.03));
        assert!(within(103.0, 100.0, 0.03));
        assert!(!within(96.9, 100.0, 0.03));
    }
}
