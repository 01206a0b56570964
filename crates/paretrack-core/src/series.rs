//! Per-key metric time series for line charts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::MetricEvent;

/// Bucket for events logged without a key.
pub const UNKNOWN_KEY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub run_id: String,
    /// `None` where the run logged an explicit null, so charts can show a gap.
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Group events by metric key, each group in `created_at` order.
pub fn group_metric_series(events: &[MetricEvent]) -> BTreeMap<String, Vec<SeriesPoint>> {
    let mut grouped: BTreeMap<String, Vec<SeriesPoint>> = BTreeMap::new();

    for event in events {
        let Some(run_id) = event.run_id.as_deref().filter(|r| !r.is_empty()) else {
            continue;
        };
        let key = event
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(UNKNOWN_KEY);
        grouped.entry(key.to_string()).or_default().push(SeriesPoint {
            run_id: run_id.to_string(),
            value: event.value.filter(|v| v.is_finite()),
            created_at: event.created_at,
        });
    }

    for points in grouped.values_mut() {
        points.sort_by_key(|p| p.created_at);
    }
    grouped
}

/// Series of a single run.
pub fn metric_series_for_run(events: &[MetricEvent], run_id: &str) -> BTreeMap<String, Vec<SeriesPoint>> {
    let mut grouped = group_metric_series(events);
    grouped.retain(|_, points| {
        points.retain(|p| p.run_id == run_id);
        !points.is_empty()
    });
    grouped
}
