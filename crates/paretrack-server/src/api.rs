//! REST API handlers for paretrack-server.

use std::collections::BTreeSet;
use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use paretrack_core::presentation::axis_label;
use paretrack_core::{
    frontier_line, group_metric_series, parse_objectives, plot_points, storage,
    validate_objectives, FrontierAnalysis, MetricEvent, ObjectiveSpec, ParetrackError,
    PlotPoint, RunMetricTable,
};

use crate::state::AppState;

// ─── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/experiments", get(list_experiments))
        .route("/experiments/{exp}/vectors", get(get_vectors))
        .route("/experiments/{exp}/series", get(get_series))
        .route("/experiments/{exp}/frontier", get(get_frontier))
        .route("/frontier", post(post_frontier))
        .route("/config", get(get_server_config))
        .route("/cache", delete(clear_cache))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn exp_dir(base: &std::path::Path, exp: &str) -> PathBuf {
    base.join(exp)
}

fn error_response(e: ParetrackError) -> Response {
    let status = match &e {
        ParetrackError::InvalidObjective(_)
        | ParetrackError::ObjectiveCount(_)
        | ParetrackError::DuplicateObjective(_) => StatusCode::BAD_REQUEST,
        ParetrackError::ExperimentNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("request failed: {}", e);
    }
    (status, e.to_string()).into_response()
}

/// Events of one experiment. Names that could leave the base directory are
/// treated as unknown experiments.
fn load_experiment(state: &AppState, exp: &str) -> Result<Vec<MetricEvent>, ParetrackError> {
    if exp.is_empty() || exp.contains("..") || exp.contains('/') || exp.contains('\\') {
        return Err(ParetrackError::ExperimentNotFound(exp.to_string()));
    }
    storage::experiment_events(&exp_dir(&state.base_dir, exp))
}

/// Frontier analysis plus everything a chart needs to draw it.
#[derive(Debug, Clone, Serialize)]
pub struct FrontierReport {
    pub objectives: Vec<ObjectiveSpec>,
    pub axes: Vec<String>,
    pub frontier: BTreeSet<String>,
    pub dominated: BTreeSet<String>,
    pub excluded: BTreeSet<String>,
    /// Frontier run ids in line-drawing order; only for 2 or 3 objectives.
    pub line: Option<Vec<String>>,
    pub points: Vec<PlotPoint>,
}

impl FrontierReport {
    pub fn new(table: &RunMetricTable, analysis: &FrontierAnalysis, objectives: &[ObjectiveSpec]) -> Self {
        let line = frontier_line(&table.vectors, objectives, &analysis.frontier)
            .map(|points| points.into_iter().map(|v| v.run_id.clone()).collect());
        Self {
            objectives: objectives.to_vec(),
            axes: objectives.iter().map(axis_label).collect(),
            frontier: analysis.frontier.clone(),
            dominated: analysis.dominated.clone(),
            excluded: analysis.excluded.clone(),
            line,
            points: plot_points(&table.vectors, objectives, analysis),
        }
    }
}

fn frontier_report(
    state: &AppState,
    events: &[MetricEvent],
    objectives: &[ObjectiveSpec],
) -> FrontierReport {
    let (table, analysis) = state.cache.analyze(events, objectives);
    debug!(
        runs = table.vectors.len(),
        frontier = analysis.frontier.len(),
        "frontier request"
    );
    FrontierReport::new(&table, &analysis, objectives)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn list_experiments(State(state): State<AppState>) -> impl IntoResponse {
    match storage::list_experiments(&state.base_dir) {
        Ok(names) => {
            let mut result = vec![];
            for name in names {
                let runs = storage::list_runs(&exp_dir(&state.base_dir, &name)).unwrap_or_default();
                result.push(serde_json::json!({
                    "id": name,
                    "runs_count": runs.len(),
                }));
            }
            Json(result).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_vectors(State(state): State<AppState>, Path(exp): Path<String>) -> impl IntoResponse {
    match load_experiment(&state, &exp) {
        Ok(events) => Json(state.cache.vectors(&events).as_ref()).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_series(State(state): State<AppState>, Path(exp): Path<String>) -> impl IntoResponse {
    match load_experiment(&state, &exp) {
        Ok(events) => Json(group_metric_series(&events)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Query params for `get_frontier`.
#[derive(Deserialize, Default)]
struct FrontierQuery {
    /// Comma-separated `key:direction` list, e.g. `acc:max,latency:min`.
    objectives: Option<String>,
}

async fn get_frontier(
    State(state): State<AppState>,
    Path(exp): Path<String>,
    Query(q): Query<FrontierQuery>,
) -> impl IntoResponse {
    let objectives = match parse_objectives(q.objectives.as_deref().unwrap_or(""))
        .and_then(|o| validate_objectives(&o).map(|_| o))
    {
        Ok(o) => o,
        Err(e) => return error_response(e),
    };
    match load_experiment(&state, &exp) {
        Ok(events) => Json(frontier_report(&state, &events, &objectives)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct FrontierRequest {
    events: Vec<MetricEvent>,
    objectives: Vec<ObjectiveSpec>,
}

async fn post_frontier(
    State(state): State<AppState>,
    Json(request): Json<FrontierRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_objectives(&request.objectives) {
        return error_response(e);
    }
    Json(frontier_report(&state, &request.events, &request.objectives)).into_response()
}

async fn get_server_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(cache_status(&state))
}

async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    state.cache.clear();
    info!("frontier cache cleared");
    Json(cache_status(&state))
}

fn cache_status(state: &AppState) -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "cache_capacity": state.cache.capacity(),
        "cache_hits": state.cache.hits(),
        "cache_misses": state.cache.misses(),
        "cache_entries": state.cache.len(),
    })
}
