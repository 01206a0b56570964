//! API tests driving the router in-process.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use paretrack_core::{storage, RunMetricRow};
use paretrack_server::build_router;
use paretrack_server::state::{AppState, ServerConfig};

fn write_run(exp_dir: &std::path::Path, run: &str, acc: f64, latency: Option<f64>) {
    let mut values = BTreeMap::new();
    values.insert("acc".to_string(), Some(acc));
    values.insert("latency".to_string(), latency);
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    storage::write_run_metrics(
        &exp_dir.join(run).join("metrics.parquet"),
        &[RunMetricRow::new(values, Some(0)).at(at)],
    )
    .unwrap();
}

fn fixture() -> (TempDir, AppState) {
    let tmp = TempDir::new().unwrap();
    let exp = tmp.path().join("bench");
    write_run(&exp, "run-a", 0.9, Some(30.0));
    write_run(&exp, "run-b", 0.8, Some(10.0));
    write_run(&exp, "run-c", 0.7, Some(40.0));
    write_run(&exp, "run-d", 0.95, None);

    let config = ServerConfig {
        base_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };
    (tmp, AppState::new(&config))
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::String(
        String::from_utf8_lossy(&bytes).to_string(),
    ));
    (status, body)
}

#[tokio::test]
async fn test_list_experiments() {
    let (_tmp, state) = fixture();
    let (status, body) = get(&state, "/api/experiments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "bench", "runs_count": 4}]));
}

#[tokio::test]
async fn test_vectors_endpoint() {
    let (_tmp, state) = fixture();
    let (status, body) = get(&state, "/api/experiments/bench/vectors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"], json!(["acc", "latency"]));
    assert_eq!(body["vectors"].as_array().unwrap().len(), 4);
    assert_eq!(body["vectors"][3]["runId"], "run-d");
    assert!(body["vectors"][3]["metrics"].get("latency").is_none());
}

#[tokio::test]
async fn test_frontier_endpoint() {
    let (_tmp, state) = fixture();
    let (status, body) = get(
        &state,
        "/api/experiments/bench/frontier?objectives=acc:max,latency:min",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frontier"], json!(["run-a", "run-b"]));
    assert_eq!(body["dominated"], json!(["run-c"]));
    assert_eq!(body["excluded"], json!(["run-d"]));
    assert_eq!(body["line"], json!(["run-b", "run-a"]));
    assert_eq!(body["axes"], json!(["acc (max)", "latency (min)"]));
    assert_eq!(body["points"].as_array().unwrap().len(), 3);
    assert_eq!(body["points"][0]["runId"], "run-a");
    assert_eq!(body["points"][0]["onFrontier"], true);

    get(&state, "/api/experiments/bench/frontier?objectives=acc:max,latency:min").await;
    assert!(state.cache.hits() >= 2);
}

#[tokio::test]
async fn test_frontier_rejects_bad_objectives() {
    let (_tmp, state) = fixture();
    let (status, _) = get(&state, "/api/experiments/bench/frontier").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&state, "/api/experiments/bench/frontier?objectives=acc:up").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(
        &state,
        "/api/experiments/bench/frontier?objectives=a:max,b:max,c:max,d:max",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_experiment_is_404() {
    let (_tmp, state) = fixture();
    let (status, _) = get(&state, "/api/experiments/missing/vectors").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&state, "/api/experiments/..%2F..%2Fetc/vectors").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_series_endpoint() {
    let (_tmp, state) = fixture();
    let (status, body) = get(&state, "/api/experiments/bench/series").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acc"].as_array().unwrap().len(), 4);
    assert_eq!(body["latency"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_post_frontier() {
    let (_tmp, state) = fixture();
    let payload = json!({
        "events": [
            {"key": "x", "value": 1.0, "runId": "A", "createdAt": "2024-01-01T00:00:00Z"},
            {"key": "x", "value": 0.5, "runId": "B", "createdAt": "2024-01-01T00:00:00Z"},
            {"key": "x", "value": null, "runId": "A", "createdAt": "2024-01-01T00:05:00Z"}
        ],
        "objectives": [{"key": "x", "direction": "maximize"}]
    });
    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/frontier")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frontier"], json!(["A"]));
    assert_eq!(body["line"], Value::Null);
}

#[tokio::test]
async fn test_config_endpoint() {
    let (_tmp, state) = fixture();
    let (status, body) = get(&state, "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_capacity"], 64);
}

#[tokio::test]
async fn test_clear_cache() {
    let (_tmp, state) = fixture();
    get(&state, "/api/experiments/bench/vectors").await;
    let (_, body) = get(&state, "/api/config").await;
    assert_eq!(body["cache_entries"], 1);

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_entries"], 0);
    assert!(state.cache.is_empty());
}
