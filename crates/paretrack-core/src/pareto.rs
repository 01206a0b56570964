//! Pareto frontier analysis over run metric vectors.
//!
//! A run is a candidate only when it has a value for every selected objective.
//! The frontier is found by brute force: each candidate is checked against
//! every other candidate, O(n² · k) with k ≤ 3.

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{FrontierAnalysis, ObjectiveSpec, RunMetricVector};

/// True when `a` is no worse than `b` on every objective and strictly better
/// on at least one. A missing value on either side means no dominance.
pub fn dominates(a: &RunMetricVector, b: &RunMetricVector, objectives: &[ObjectiveSpec]) -> bool {
    let mut better_somewhere = false;

    for objective in objectives {
        let (Some(va), Some(vb)) = (a.get(&objective.key), b.get(&objective.key)) else {
            return false;
        };
        if objective.direction.is_worse(va, vb) {
            return false;
        }
        if objective.direction.is_better(va, vb) {
            better_somewhere = true;
        }
    }

    better_somewhere
}

/// Runs that have a value for every objective key, in input order.
pub fn candidates<'a>(
    vectors: &'a [RunMetricVector],
    objectives: &[ObjectiveSpec],
) -> Vec<&'a RunMetricVector> {
    vectors.iter().filter(|v| v.covers(objectives)).collect()
}

/// Run ids of the candidates no other candidate dominates.
pub fn pareto_frontier(vectors: &[RunMetricVector], objectives: &[ObjectiveSpec]) -> BTreeSet<String> {
    analyze_frontier(vectors, objectives).frontier
}

/// Like [`pareto_frontier`], but also reports which runs were dominated and
/// which were left out for missing an objective.
pub fn analyze_frontier(vectors: &[RunMetricVector], objectives: &[ObjectiveSpec]) -> FrontierAnalysis {
    let mut analysis = FrontierAnalysis::default();
    let mut pool = Vec::with_capacity(vectors.len());

    for vector in vectors {
        if vector.covers(objectives) {
            pool.push(vector);
        } else {
            analysis.excluded.insert(vector.run_id.clone());
        }
    }

    for a in &pool {
        let dominated = pool
            .iter()
            .any(|b| b.run_id != a.run_id && dominates(b, a, objectives));
        if dominated {
            analysis.dominated.insert(a.run_id.clone());
        } else {
            analysis.frontier.insert(a.run_id.clone());
        }
    }

    // A run id seen more than once keeps its best bucket.
    let frontier = &analysis.frontier;
    analysis.dominated.retain(|id| !frontier.contains(id));
    let (frontier, dominated) = (&analysis.frontier, &analysis.dominated);
    analysis
        .excluded
        .retain(|id| !frontier.contains(id) && !dominated.contains(id));

    debug!(
        objectives = objectives.len(),
        candidates = pool.len(),
        frontier = analysis.frontier.len(),
        excluded = analysis.excluded.len(),
        "computed pareto frontier"
    );

    analysis
}
