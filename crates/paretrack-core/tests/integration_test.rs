//! Integration tests for paretrack-core.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use paretrack_core::storage;
use paretrack_core::{
    analyze_frontier, build_run_metric_vectors, frontier_line, FrontierCache, MetricEvent,
    ObjectiveSpec, ParetrackError, RunMetricRow,
};
use tempfile::TempDir;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn sample_events() -> Vec<MetricEvent> {
    vec![
        MetricEvent::new("run-a", "accuracy", 0.70, t(0)).with_id("m1"),
        MetricEvent::new("run-a", "accuracy", 0.91, t(10)).with_id("m2"),
        MetricEvent::new("run-a", "latency", 42.0, t(11)).with_id("m3"),
        MetricEvent::new("run-b", "accuracy", 0.88, t(5)).with_id("m4"),
        MetricEvent::new("run-b", "latency", 12.0, t(6)).with_id("m5"),
        MetricEvent::null("run-b", "latency", t(7)).with_id("m6"),
        MetricEvent::new("run-c", "accuracy", 0.80, t(3)).with_id("m7"),
        MetricEvent::new("run-c", "latency", 50.0, t(4)).with_id("m8"),
        MetricEvent::new("run-d", "accuracy", 0.99, t(2)).with_id("m9"),
    ]
}

fn row(step: u64, secs: i64, values: &[(&str, Option<f64>)]) -> RunMetricRow {
    let values: BTreeMap<String, Option<f64>> =
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    RunMetricRow::new(values, Some(step)).at(t(secs))
}

#[test]
fn test_end_to_end_frontier() {
    let table = build_run_metric_vectors(&sample_events());
    assert_eq!(table.keys, vec!["accuracy", "latency"]);
    assert_eq!(table.get("run-b").unwrap().get("latency"), Some(12.0));

    let objectives = [
        ObjectiveSpec::maximize("accuracy"),
        ObjectiveSpec::minimize("latency"),
    ];
    let analysis = analyze_frontier(&table.vectors, &objectives);

    assert!(analysis.is_on_frontier("run-a"));
    assert!(analysis.is_on_frontier("run-b"));
    assert!(analysis.dominated.contains("run-c"));
    assert!(analysis.excluded.contains("run-d"));

    let line: Vec<_> = frontier_line(&table.vectors, &objectives, &analysis.frontier)
        .unwrap()
        .into_iter()
        .map(|v| v.run_id.as_str())
        .collect();
    assert_eq!(line, vec!["run-b", "run-a"]);
}

#[test]
fn test_event_files_load_in_every_format() {
    let tmp = TempDir::new().unwrap();
    let events = sample_events();

    for name in ["events.json", "events.yaml", "nested/events.parquet"] {
        let path = tmp.path().join(name);
        storage::write_event_file(&path, &events).unwrap();
        let loaded = storage::read_event_file(&path).unwrap();
        assert_eq!(loaded, events, "{name} should load back unchanged");
    }
}

#[test]
fn test_parquet_keeps_sub_microsecond_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    let base = t(0);
    let events = vec![
        MetricEvent::new("r1", "acc", 0.9, base + chrono::Duration::nanoseconds(700)),
        MetricEvent::new("r1", "acc", 0.1, base + chrono::Duration::nanoseconds(300)),
    ];

    storage::write_event_file(&path, &events).unwrap();
    let loaded = storage::read_event_file(&path).unwrap();
    assert_eq!(loaded, events);
    let table = build_run_metric_vectors(&loaded);
    assert_eq!(table.get("r1").unwrap().get("acc"), Some(0.9));
}

#[test]
fn test_write_experiment_splits_runs() {
    let tmp = TempDir::new().unwrap();
    let exp_dir = tmp.path().join("converted");
    let events = sample_events();

    assert_eq!(storage::write_experiment(&exp_dir, &events).unwrap(), 4);
    assert_eq!(storage::list_runs(&exp_dir).unwrap().len(), 4);

    let reloaded = storage::load_events(&exp_dir).unwrap();
    assert_eq!(reloaded.len(), 8, "the null-only cell is not written");
    assert_eq!(
        build_run_metric_vectors(&reloaded),
        build_run_metric_vectors(&events)
    );
}

#[test]
fn test_write_experiment_rejects_unsafe_run_ids() {
    let tmp = TempDir::new().unwrap();
    let events = vec![MetricEvent::new("../escape", "acc", 1.0, t(0))];
    assert!(storage::write_experiment(tmp.path(), &events).is_err());
    assert!(!tmp.path().join("escape").exists());
}

#[test]
fn test_json_with_nulls_and_missing_fields() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("upstream.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "1", "key": "acc", "value": 0.5, "runId": "r1", "createdAt": "2024-01-01T00:00:00Z"},
            {"id": "2", "key": "acc", "value": null, "runId": "r1", "createdAt": "2024-01-01T00:01:00Z"},
            {"id": "3", "key": null, "value": 1.0, "runId": "r1", "createdAt": "2024-01-01T00:02:00Z"},
            {"id": "4", "key": "acc", "value": 0.9, "createdAt": "2024-01-01T00:03:00Z"}
        ]"#,
    )
    .unwrap();

    let events = storage::load_events(&path).unwrap();
    assert_eq!(events.len(), 4);
    let table = build_run_metric_vectors(&events);
    assert_eq!(table.vectors.len(), 1);
    assert_eq!(table.get("r1").unwrap().get("acc"), Some(0.5));
}

#[test]
fn test_unsupported_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.csv");
    std::fs::write(&path, "key,value\n").unwrap();
    assert!(matches!(
        storage::read_event_file(&path),
        Err(ParetrackError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_experiment_directory_layout() {
    let tmp = TempDir::new().unwrap();
    let exp_dir = tmp.path().join("resnet");

    storage::write_run_metrics(
        &exp_dir.join("20240101_120000").join("metrics.parquet"),
        &[
            row(0, 0, &[("loss", Some(0.9)), ("acc", None)]),
            row(1, 60, &[("loss", Some(0.4)), ("acc", Some(0.8))]),
        ],
    )
    .unwrap();
    storage::write_run_metrics(
        &exp_dir.join("20240102_090000").join("metrics.parquet"),
        &[row(0, 10, &[("loss", Some(0.3)), ("acc", Some(0.7))])],
    )
    .unwrap();
    storage::ensure_dir(&exp_dir.join("artifacts")).unwrap();

    assert_eq!(storage::list_experiments(tmp.path()).unwrap(), vec!["resnet"]);
    assert_eq!(
        storage::list_runs(&exp_dir).unwrap(),
        vec!["20240102_090000", "20240101_120000"]
    );

    let events = storage::load_events(&exp_dir).unwrap();
    assert_eq!(events.len(), 5, "empty cells are not events");

    let table = build_run_metric_vectors(&events);
    let first = table.get("20240101_120000").unwrap();
    assert_eq!(first.get("loss"), Some(0.4));
    assert_eq!(first.get("acc"), Some(0.8));

    let run_only = storage::load_events(&exp_dir.join("20240102_090000")).unwrap();
    assert_eq!(run_only.len(), 2);
    assert!(run_only
        .iter()
        .all(|e| e.run_id.as_deref() == Some("20240102_090000")));
}

#[test]
fn test_missing_experiment_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(
        storage::experiment_events(&tmp.path().join("nope")),
        Err(ParetrackError::ExperimentNotFound(_))
    ));
}

#[test]
fn test_cache_matches_direct_computation() {
    let cache = FrontierCache::new(8);
    let events = sample_events();
    let objectives = [
        ObjectiveSpec::maximize("accuracy"),
        ObjectiveSpec::minimize("latency"),
    ];

    let (table, analysis) = cache.analyze(&events, &objectives);
    let direct = build_run_metric_vectors(&events);
    assert_eq!(*table, direct);
    assert_eq!(*analysis, analyze_frontier(&direct.vectors, &objectives));

    let clone = cache.clone();
    clone.analyze(&events, &objectives);
    assert_eq!(cache.hits(), 2, "clones share entries");
}
