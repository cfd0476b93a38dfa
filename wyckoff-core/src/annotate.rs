//! Chart annotation: the input bars with events and phases attached.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::AnalysisResult;
use crate::domain::{Bar, BarSeries, Phase};

/// One input bar plus what the engine saw there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedBar {
    #[serde(flatten)]
    pub bar: Bar,
    /// Comma-joined event names in emission order, e.g. `"SOS,JAC"`.
    pub events: Option<String>,
    /// Event details keyed by event name.
    pub details: Option<Value>,
    pub phase: Phase,
}

/// Attach events and phases to every bar of `series`.
///
/// Bars without events carry `None` for both event columns. When the
/// result is empty (short series) every bar is UNKNOWN.
pub fn annotate_chart(series: &BarSeries, result: &AnalysisResult) -> Vec<AnnotatedBar> {
    let mut annotated: Vec<AnnotatedBar> = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| AnnotatedBar {
            bar: *bar,
            events: None,
            details: None,
            phase: result.phases.get(i).copied().unwrap_or_default(),
        })
        .collect();

    for event in &result.events {
        let Some(row) = annotated.get_mut(event.bar_index) else {
            continue;
        };

        let name = event.kind.as_str();
        row.events = Some(match row.events.take() {
            Some(existing) => format!("{existing},{name}"),
            None => name.to_string(),
        });

        let details: Map<String, Value> = event
            .details
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Value::Object(map) = row.details.get_or_insert_with(|| Value::Object(Map::new())) {
            map.insert(name.to_string(), Value::Object(details));
        }
    }

    annotated
}
