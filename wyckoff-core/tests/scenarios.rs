//! End-to-end scenarios through `run_analysis`.
//!
//! Fixtures are hand-built bar sequences: flat bars (100 / 101 / 99 / 100,
//! volume 1000) with specific bars overwritten. Lookbacks are shortened to
//! 10 bars so that structure can start early in the series.

use chrono::{NaiveDate, NaiveDateTime};
use wyckoff_core::{
    annotate_chart, run_analysis, AnalysisConfig, AnalysisError, Bar, BarError, BarSeries,
    ConfigError, EventKind, MarketContext, Phase, StallPolicy,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn flat(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| Bar {
            timestamp: base_time() + chrono::Duration::days(i as i64),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        })
        .collect()
}

fn set(bars: &mut [Bar], i: usize, (open, high, low, close, volume): (f64, f64, f64, f64, f64)) {
    bars[i].open = open;
    bars[i].high = high;
    bars[i].low = low;
    bars[i].close = close;
    bars[i].volume = volume;
}

fn short_config() -> AnalysisConfig {
    AnalysisConfig {
        vol_lookback: 10,
        range_lookback: 10,
        swing_point_n: 3,
        tr_max_duration: 20,
        ..AnalysisConfig::default()
    }
}

fn kinds_at(series: &BarSeries, result: &wyckoff_core::AnalysisResult, i: usize) -> Vec<EventKind> {
    let ts = series.bars[i].timestamp;
    result
        .events
        .iter()
        .filter(|e| e.timestamp == ts)
        .map(|e| e.kind)
        .collect()
}

/// 100 bars: SC at 10, rally to a swing high at 13, secondary test at 21,
/// spring at 32, SOS breakout at 33, then a quiet markup.
fn accumulation_fixture() -> BarSeries {
    let mut bars = flat(100);
    set(&mut bars, 10, (100.0, 100.0, 89.0, 90.0, 5000.0));
    set(&mut bars, 11, (90.0, 97.0, 90.0, 96.0, 1500.0));
    set(&mut bars, 12, (96.0, 102.0, 95.0, 101.0, 1200.0));
    set(&mut bars, 13, (101.0, 104.0, 100.0, 103.0, 1100.0));
    set(&mut bars, 14, (103.0, 103.0, 98.0, 99.0, 1000.0));
    set(&mut bars, 15, (99.0, 100.0, 96.0, 97.0, 1000.0));
    set(&mut bars, 16, (97.0, 98.0, 94.0, 95.0, 1000.0));
    set(&mut bars, 17, (95.0, 96.0, 93.0, 94.0, 1000.0));
    set(&mut bars, 18, (94.0, 95.0, 92.0, 93.0, 1000.0));
    set(&mut bars, 19, (93.0, 94.0, 91.5, 92.0, 1000.0));
    set(&mut bars, 20, (92.0, 93.0, 91.0, 92.0, 1000.0));
    set(&mut bars, 21, (92.0, 92.5, 90.0, 91.0, 700.0));
    set(&mut bars, 22, (91.0, 95.0, 90.5, 94.0, 1000.0));
    for i in 23..32 {
        set(&mut bars, i, (94.0, 99.0, 93.0, 97.0, 1000.0));
    }
    set(&mut bars, 32, (97.0, 97.5, 87.0, 92.0, 1100.0));
    set(&mut bars, 33, (92.0, 107.0, 92.0, 106.0, 1800.0));
    for i in 34..100 {
        set(&mut bars, i, (106.0, 107.0, 105.0, 106.0, 1000.0));
    }
    BarSeries::new("ACC", bars)
}

/// 60 bars: BC at 10, reaction low at 13, ST_DIST at 17, UTAD at 26,
/// SOW at 27, LPSY at 28.
fn distribution_fixture() -> BarSeries {
    let mut bars = flat(60);
    set(&mut bars, 10, (100.0, 111.0, 100.0, 110.0, 5000.0));
    set(&mut bars, 11, (110.0, 110.0, 104.0, 105.0, 1500.0));
    set(&mut bars, 12, (105.0, 106.0, 99.0, 100.0, 1200.0));
    set(&mut bars, 13, (100.0, 101.0, 96.0, 97.0, 1100.0));
    set(&mut bars, 14, (97.0, 101.0, 96.5, 100.0, 1000.0));
    set(&mut bars, 15, (100.0, 104.0, 99.0, 103.0, 1000.0));
    set(&mut bars, 16, (103.0, 106.0, 102.0, 105.0, 1000.0));
    set(&mut bars, 17, (105.0, 108.0, 104.0, 107.0, 800.0));
    for i in 18..26 {
        set(&mut bars, i, (105.0, 107.0, 102.0, 104.0, 1000.0));
    }
    set(&mut bars, 26, (104.0, 113.0, 103.0, 108.0, 1100.0));
    set(&mut bars, 27, (108.0, 108.0, 93.0, 94.0, 1800.0));
    for i in 28..60 {
        set(&mut bars, i, (94.0, 95.0, 93.0, 94.0, 1000.0));
    }
    BarSeries::new("DIST", bars)
}

// ── Scenarios ────────────────────────────────────────────────────────

/// Selling climax at `at`, rally peaking three bars later.
fn climax_then_rally(n: usize, at: usize) -> BarSeries {
    let mut bars = flat(n);
    set(&mut bars, at, (99.0, 100.0, 89.0, 90.0, 5000.0));
    set(&mut bars, at + 1, (90.0, 96.0, 90.0, 95.0, 1500.0));
    set(&mut bars, at + 2, (95.0, 102.0, 94.0, 101.0, 1200.0));
    set(&mut bars, at + 3, (101.0, 105.0, 99.0, 103.0, 1100.0));
    set(&mut bars, at + 4, (103.0, 103.0, 99.0, 100.0, 1000.0));
    BarSeries::new("SPY", bars)
}

// Uses the 10-bar windows of `short_config`. Under the default 20-bar
// windows bar 15 is inside the warm-up and cannot be a climax; see
// `default_windows_need_climax_after_warmup`.
#[test]
fn climax_followed_by_swing_high_opens_range() {
    let series = climax_then_rally(60, 15);

    let result = run_analysis(&series, &short_config()).unwrap();

    assert_eq!(result.events[0].kind, EventKind::Sc);
    assert_eq!(result.events[0].bar_index, 15);
    assert_eq!(result.events[1].kind, EventKind::Ar);
    assert_eq!(result.events[1].bar_index, 18);

    assert_eq!(result.trading_ranges.len(), 1);
    let range = &result.trading_ranges[0];
    assert_eq!(range.start_timestamp, series.bars[15].timestamp);
    assert_eq!(range.support, 89.0);
    assert_eq!(range.resistance, 105.0);
    assert_eq!(range.context, MarketContext::Accumulation);
    assert!(range.is_open());

    assert_eq!(result.phases[14], Phase::Unknown);
    assert!(result.phases[15..].iter().all(|p| *p == Phase::A));
}

#[test]
fn default_windows_need_climax_after_warmup() {
    let config = AnalysisConfig::default();
    assert_eq!(config.warmup_bars(), 20);

    let early = run_analysis(&climax_then_rally(60, 15), &config).unwrap();
    assert!(early.events.is_empty());
    assert!(early.phases.iter().all(|p| *p == Phase::Unknown));

    // the same shape past the warm-up, against a prior 20-bar window
    let late = run_analysis(&climax_then_rally(60, 25), &config).unwrap();
    let events: Vec<_> = late.events.iter().map(|e| (e.bar_index, e.kind)).collect();
    assert_eq!(events, vec![(25, EventKind::Sc), (28, EventKind::Ar)]);
    let range = &late.trading_ranges[0];
    assert_eq!((range.support, range.resistance), (89.0, 105.0));
}

#[test]
fn stalled_climax_context_follows_stall_policy() {
    let mut bars = flat(60);
    set(&mut bars, 15, (99.0, 100.0, 89.0, 90.0, 5000.0));
    // first swing high, long after the 20-bar reaction window
    set(&mut bars, 45, (100.0, 106.0, 99.0, 100.0, 1000.0));
    let series = BarSeries::new("STALL", bars);

    let expired = run_analysis(&series, &short_config()).unwrap();
    let summary = expired.summary();
    assert_eq!(summary.context, MarketContext::Undefined);
    assert_eq!(
        summary.expired.map(|x| (x.climax_bar, x.bar_index)),
        Some((15, 36))
    );

    let persist = AnalysisConfig {
        stall_policy: StallPolicy::Persist,
        ..short_config()
    };
    let kept = run_analysis(&series, &persist).unwrap();
    let summary = kept.summary();
    assert_eq!(summary.context, MarketContext::Accumulation);
    assert!(summary.expired.is_none());
    assert!(kept.expiries.is_empty());

    assert_eq!(kept.events, expired.events);
    assert_ne!(kept, expired);
}

#[test]
fn accumulation_runs_through_a_c_d() {
    let series = accumulation_fixture();
    let result = run_analysis(&series, &short_config()).unwrap();

    assert_eq!(kinds_at(&series, &result, 10), vec![EventKind::Sc]);
    assert_eq!(kinds_at(&series, &result, 13), vec![EventKind::Ar]);
    assert_eq!(kinds_at(&series, &result, 21), vec![EventKind::St]);
    assert_eq!(kinds_at(&series, &result, 32), vec![EventKind::Spring]);
    assert_eq!(kinds_at(&series, &result, 33), vec![EventKind::Sos, EventKind::Jac]);
    assert_eq!(kinds_at(&series, &result, 34), vec![EventKind::Lps]);

    assert_eq!(result.phases[9], Phase::Unknown);
    assert_eq!(result.phases[10], Phase::A);
    assert_eq!(result.phases[20], Phase::A);
    assert_eq!(result.phases[21], Phase::B);
    assert_eq!(result.phases[31], Phase::B);
    assert_eq!(result.phases[32], Phase::C);
    assert!(result.phases[33..].iter().all(|p| *p == Phase::D));

    let range = &result.trading_ranges[0];
    assert_eq!((range.support, range.resistance), (89.0, 104.0));

    let spring = result
        .events
        .iter()
        .find(|e| e.kind == EventKind::Spring)
        .unwrap();
    assert_eq!(spring.details["quality"], "needs_test");
    assert_eq!(spring.details["penetration"], 2.0);

    let summary = result.summary();
    assert_eq!(summary.current_phase, Phase::D);
    assert_eq!(summary.context, MarketContext::Accumulation);
    assert_eq!(summary.last_event.map(|e| e.kind), Some(EventKind::Lps));
    assert_eq!(summary.event_counts[&EventKind::Sos], 1);
}

#[test]
fn distribution_runs_through_a_b_c_d() {
    let series = distribution_fixture();
    let result = run_analysis(&series, &short_config()).unwrap();

    assert_eq!(kinds_at(&series, &result, 10), vec![EventKind::Bc]);
    assert_eq!(kinds_at(&series, &result, 13), vec![EventKind::AutoReaction]);
    assert_eq!(kinds_at(&series, &result, 17), vec![EventKind::StDist]);
    assert_eq!(kinds_at(&series, &result, 26), vec![EventKind::Utad]);
    assert_eq!(kinds_at(&series, &result, 27), vec![EventKind::Sow]);
    assert_eq!(kinds_at(&series, &result, 28), vec![EventKind::Lpsy]);

    assert_eq!(result.phases[10], Phase::A);
    assert_eq!(result.phases[17], Phase::B);
    assert_eq!(result.phases[26], Phase::C);
    assert_eq!(result.phases[27], Phase::D);

    let range = &result.trading_ranges[0];
    assert_eq!((range.support, range.resistance), (96.0, 111.0));
    assert_eq!(range.context, MarketContext::Distribution);
}

#[test]
fn neutral_series_has_no_structure() {
    let series = BarSeries::new("FLAT", flat(60));
    let result = run_analysis(&series, &AnalysisConfig::default()).unwrap();

    assert_eq!(result.phases.len(), 60);
    assert!(result.phases.iter().all(|p| *p == Phase::Unknown));
    assert!(result.events.is_empty());
    assert!(result.trading_ranges.is_empty());
}

#[test]
fn annotation_matches_result() {
    let series = accumulation_fixture();
    let result = run_analysis(&series, &short_config()).unwrap();
    let rows = annotate_chart(&series, &result);

    assert_eq!(rows.len(), series.len());
    assert_eq!(rows[33].events.as_deref(), Some("SOS,JAC"));
    assert_eq!(rows[32].phase, Phase::C);
    let details = rows[33].details.as_ref().unwrap();
    assert_eq!(details["JAC"]["resistance"], 104.0);
    assert!(rows[40].events.is_none());
}

// ── Input contract ───────────────────────────────────────────────────

#[test]
fn unordered_timestamps_are_rejected() {
    let mut bars = flat(40);
    bars.swap(5, 6);
    let err = run_analysis(&BarSeries::new("SPY", bars), &short_config()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidInput(BarError::Unordered { index: 6, .. })
    ));
}

#[test]
fn duplicate_timestamps_are_rejected() {
    let mut bars = flat(40);
    bars[8].timestamp = bars[7].timestamp;
    let err = run_analysis(&BarSeries::new("SPY", bars), &short_config()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidInput(BarError::Unordered { index: 8, .. })
    ));
}

#[test]
fn inverted_bar_is_rejected() {
    let mut bars = flat(40);
    set(&mut bars, 12, (100.0, 98.0, 101.0, 100.0, 1000.0));
    let err = run_analysis(&BarSeries::new("SPY", bars), &short_config()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidInput(BarError::Insane { index: 12, .. })
    ));
}

#[test]
fn zero_lookback_is_a_configuration_error() {
    let config = AnalysisConfig {
        vol_lookback: 0,
        ..AnalysisConfig::default()
    };
    let err = run_analysis(&BarSeries::new("SPY", flat(40)), &config).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Configuration(ConfigError::InvalidParameter {
            name: "vol_lookback",
            ..
        })
    ));
}

#[test]
fn series_one_bar_short_is_empty() {
    let config = short_config();
    let series = BarSeries::new("SPY", accumulation_fixture().bars[..config.min_bars() - 1].to_vec());
    let result = run_analysis(&series, &config).unwrap();
    assert!(result.phases.is_empty());
    assert!(result.events.is_empty());
}
