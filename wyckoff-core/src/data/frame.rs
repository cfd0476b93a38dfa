//! DataFrame ↔ engine conversions.
//!
//! `bars_from_frame` accepts any frame carrying the canonical columns and
//! casts them (integer volumes, date or microsecond timestamps are fine).
//! `annotated_frame` is the tabular form of `annotate_chart`'s output.

use chrono::DateTime;
use polars::prelude::*;

use super::schema::{BarSchema, SchemaError};
use crate::annotate::AnnotatedBar;
use crate::domain::{Bar, BarSeries};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error("null timestamp at row {0}")]
    NullTimestamp(usize),

    #[error("timestamp out of range at row {row}: {millis} ms")]
    TimestampOutOfRange { row: usize, millis: i64 },
}

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked, FrameError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.clone())
}

/// Build a series from a frame with the canonical bar columns.
///
/// Null prices become NaN so that series validation reports them by bar;
/// a null timestamp cannot be placed at all and is an error here.
pub fn bars_from_frame(df: &DataFrame, symbol: &str) -> Result<BarSeries, FrameError> {
    BarSchema::require_columns(df)?;

    let timestamps = df
        .column(BarSchema::TIMESTAMP)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    let timestamps = timestamps.i64()?;

    let [open, high, low, close, volume] = BarSchema::PRICE_COLUMNS;
    let opens = float_column(df, open)?;
    let highs = float_column(df, high)?;
    let lows = float_column(df, low)?;
    let closes = float_column(df, close)?;
    let volumes = float_column(df, volume)?;

    let mut bars = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let millis = timestamps.get(row).ok_or(FrameError::NullTimestamp(row))?;
        let timestamp = DateTime::from_timestamp_millis(millis)
            .ok_or(FrameError::TimestampOutOfRange { row, millis })?
            .naive_utc();

        bars.push(Bar {
            timestamp,
            open: opens.get(row).unwrap_or(f64::NAN),
            high: highs.get(row).unwrap_or(f64::NAN),
            low: lows.get(row).unwrap_or(f64::NAN),
            close: closes.get(row).unwrap_or(f64::NAN),
            volume: volumes.get(row).unwrap_or(f64::NAN),
        });
    }

    Ok(BarSeries::new(symbol, bars))
}

fn price_column(rows: &[AnnotatedBar], name: &str, pick: impl Fn(&Bar) -> f64) -> Column {
    let values: Vec<f64> = rows.iter().map(|r| pick(&r.bar)).collect();
    Column::new(name.into(), values)
}

/// Annotated bars as a frame: canonical bar columns plus `events`,
/// `details` (JSON text) and `phase`.
pub fn annotated_frame(rows: &[AnnotatedBar]) -> PolarsResult<DataFrame> {
    let millis: Vec<i64> = rows
        .iter()
        .map(|r| r.bar.timestamp.and_utc().timestamp_millis())
        .collect();
    let events: Vec<Option<String>> = rows.iter().map(|r| r.events.clone()).collect();
    let details: Vec<Option<String>> = rows
        .iter()
        .map(|r| r.details.as_ref().map(|d| d.to_string()))
        .collect();
    let phases: Vec<&str> = rows.iter().map(|r| r.phase.as_str()).collect();

    DataFrame::new(vec![
        Column::new(BarSchema::TIMESTAMP.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        price_column(rows, "open", |b| b.open),
        price_column(rows, "high", |b| b.high),
        price_column(rows, "low", |b| b.low),
        price_column(rows, "close", |b| b.close),
        price_column(rows, "volume", |b| b.volume),
        Column::new("events".into(), events),
        Column::new("details".into(), details),
        Column::new("phase".into(), phases),
    ])
}
