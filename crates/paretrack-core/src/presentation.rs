//! Helpers for the visualization boundary: display ordering of frontier
//! points, plot coordinates and label formatting.
//!
//! Nothing here affects frontier membership. The ordering exists only so a
//! chart can draw a line through the frontier.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{FrontierAnalysis, ObjectiveSpec, RunMetricVector};
use crate::pareto::candidates;

/// One candidate run positioned on the chart axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotPoint {
    pub run_id: String,
    /// Values in objective order: x, y, then z.
    pub coords: Vec<f64>,
    pub on_frontier: bool,
}

fn compare_on_objectives(
    a: &RunMetricVector,
    b: &RunMetricVector,
    objectives: &[ObjectiveSpec],
) -> Ordering {
    objectives
        .iter()
        .map(|o| {
            let va = a.get(&o.key).unwrap_or(f64::NAN);
            let vb = b.get(&o.key).unwrap_or(f64::NAN);
            va.total_cmp(&vb)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.run_id.cmp(&b.run_id))
}

/// Frontier members sorted by the first objective ascending, then the
/// second, then the third. Remaining ties are broken by run id.
pub fn order_frontier_points<'a>(
    vectors: &'a [RunMetricVector],
    objectives: &[ObjectiveSpec],
    frontier: &BTreeSet<String>,
) -> Vec<&'a RunMetricVector> {
    let mut points: Vec<&RunMetricVector> = vectors
        .iter()
        .filter(|v| frontier.contains(&v.run_id))
        .collect();
    points.sort_by(|a, b| compare_on_objectives(a, b, objectives));
    points
}

/// The frontier line for 2D and 3D charts; `None` for any other objective
/// count, where no line is drawn.
pub fn frontier_line<'a>(
    vectors: &'a [RunMetricVector],
    objectives: &[ObjectiveSpec],
    frontier: &BTreeSet<String>,
) -> Option<Vec<&'a RunMetricVector>> {
    matches!(objectives.len(), 2 | 3).then(|| order_frontier_points(vectors, objectives, frontier))
}

/// Chart points for every candidate run, flagged frontier or dominated.
/// Runs missing an objective have no coordinates and are left out.
pub fn plot_points(
    vectors: &[RunMetricVector],
    objectives: &[ObjectiveSpec],
    analysis: &FrontierAnalysis,
) -> Vec<PlotPoint> {
    candidates(vectors, objectives)
        .into_iter()
        .map(|v| PlotPoint {
            run_id: v.run_id.clone(),
            coords: objectives.iter().filter_map(|o| v.get(&o.key)).collect(),
            on_frontier: analysis.is_on_frontier(&v.run_id),
        })
        .collect()
}

/// Axis title such as `latency (min)`.
pub fn axis_label(objective: &ObjectiveSpec) -> String {
    format!("{} ({})", objective.key, objective.direction.short())
}

/// Compact metric value for tables and tooltips.
///
/// Whole numbers print without decimals; everything else keeps at most four
/// decimals with trailing zeros removed.
pub fn format_metric_value(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
