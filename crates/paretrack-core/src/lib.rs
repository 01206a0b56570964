//! paretrack-core: multi-objective run comparison engine.
//!
//! Two pure steps: `build_run_metric_vectors()` reduces a raw metric event
//! stream to the latest value per run and key, and `pareto_frontier()` picks
//! the runs no other run beats on every selected objective. Neither performs
//! I/O; `storage` loads events and `cache` memoizes both steps.

pub mod cache;
pub mod error;
pub mod models;
pub mod pareto;
pub mod presentation;
pub mod series;
pub mod storage;
pub mod vectors;

pub use cache::FrontierCache;
pub use error::{ParetrackError, Result};
pub use models::{
    parse_objectives, validate_objectives, Direction, FrontierAnalysis, MetricEvent,
    ObjectiveSpec, RunMetricRow, RunMetricTable, RunMetricVector, MAX_OBJECTIVES,
};
pub use pareto::{analyze_frontier, dominates, pareto_frontier};
pub use presentation::{frontier_line, order_frontier_points, plot_points, PlotPoint};
pub use series::{group_metric_series, SeriesPoint};
pub use vectors::build_run_metric_vectors;
