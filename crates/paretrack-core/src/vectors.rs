//! Metric vector builder: reduces an append-only event stream to the latest
//! value of every `(run, key)` pair.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::models::{MetricEvent, RunMetricTable, RunMetricVector};

/// Collapse `events` into one vector per run.
///
/// Events are replayed in `created_at` order. The sort is stable, so events
/// sharing a timestamp keep their input order and the later one wins. Null,
/// non-finite and incomplete events are skipped without registering their key.
pub fn build_run_metric_vectors(events: &[MetricEvent]) -> RunMetricTable {
    let mut ordered: Vec<&MetricEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.created_at);

    let mut runs: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    let mut skipped = 0usize;

    for event in ordered {
        let Some((run_id, key, value)) = event.observation() else {
            trace!(id = ?event.id, run = ?event.run_id, key = ?event.key, "skipping incomplete metric event");
            skipped += 1;
            continue;
        };
        keys.insert(key);
        runs.entry(run_id).or_default().insert(key.to_string(), value);
    }

    debug!(
        events = events.len(),
        skipped,
        runs = runs.len(),
        keys = keys.len(),
        "built run metric vectors"
    );

    RunMetricTable {
        vectors: runs
            .into_iter()
            .map(|(run_id, metrics)| RunMetricVector {
                run_id: run_id.to_string(),
                metrics,
            })
            .collect(),
        keys: keys.into_iter().map(str::to_string).collect(),
    }
}
