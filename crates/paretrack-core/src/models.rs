//! Data models for paretrack.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParetrackError, Result};

/// Upper bound on simultaneously selected objectives (x, y, z axes).
pub const MAX_OBJECTIVES: usize = 3;

/// One timestamped observation of a metric for a run.
///
/// Field names follow the upstream GraphQL shape (`runId`, `createdAt`).
/// `key`, `value` and `run_id` are optional because the event source is not
/// fully trusted; incomplete events are skipped by the vector builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub run_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MetricEvent {
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        value: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            key: Some(key.into()),
            value: Some(value),
            run_id: Some(run_id.into()),
            created_at,
        }
    }

    /// An event that was logged without a value (`value: null`).
    pub fn null(run_id: impl Into<String>, key: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key: Some(key.into()),
            value: None,
            run_id: Some(run_id.into()),
            created_at,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// `(run_id, key, value)` when the event is complete and its value finite.
    pub fn observation(&self) -> Option<(&str, &str, f64)> {
        let run_id = self.run_id.as_deref().filter(|r| !r.is_empty())?;
        let key = self.key.as_deref().filter(|k| !k.is_empty())?;
        let value = self.value.filter(|v| v.is_finite())?;
        Some((run_id, key, value))
    }
}

/// The current value of every metric a run has reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetricVector {
    pub run_id: String,
    pub metrics: BTreeMap<String, f64>,
}

impl RunMetricVector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// True when the run has a value for every objective key.
    pub fn covers(&self, objectives: &[ObjectiveSpec]) -> bool {
        objectives.iter().all(|o| self.metrics.contains_key(&o.key))
    }
}

/// Output of the vector builder: one vector per run plus every key observed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunMetricTable {
    pub vectors: Vec<RunMetricVector>,
    pub keys: Vec<String>,
}

impl RunMetricTable {
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&RunMetricVector> {
        self.vectors.iter().find(|v| v.run_id == run_id)
    }
}

/// Optimization direction of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// `a` loses to `b` on this axis.
    pub fn is_worse(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Maximize => a < b,
            Direction::Minimize => a > b,
        }
    }

    /// `a` beats `b` on this axis.
    pub fn is_better(self, a: f64, b: f64) -> bool {
        self.is_worse(b, a)
    }

    pub fn short(self) -> &'static str {
        match self {
            Direction::Maximize => "max",
            Direction::Minimize => "min",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Maximize => write!(f, "maximize"),
            Direction::Minimize => write!(f, "minimize"),
        }
    }
}

impl FromStr for Direction {
    type Err = ParetrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "maximize" => Ok(Direction::Maximize),
            "min" | "minimize" => Ok(Direction::Minimize),
            other => Err(ParetrackError::InvalidObjective(other.to_string())),
        }
    }
}

/// A metric key paired with the direction it should be optimized in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub key: String,
    pub direction: Direction,
}

impl ObjectiveSpec {
    pub fn new(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    pub fn maximize(key: impl Into<String>) -> Self {
        Self::new(key, Direction::Maximize)
    }

    pub fn minimize(key: impl Into<String>) -> Self {
        Self::new(key, Direction::Minimize)
    }
}

impl fmt::Display for ObjectiveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.direction)
    }
}

/// Parses `key:direction`. The last `:` separates the direction, so metric
/// keys such as `eval:acc` stay intact.
impl FromStr for ObjectiveSpec {
    type Err = ParetrackError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (key, direction) = s
            .rsplit_once(':')
            .ok_or_else(|| ParetrackError::InvalidObjective(s.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParetrackError::InvalidObjective(s.to_string()));
        }
        let direction = direction
            .parse::<Direction>()
            .map_err(|_| ParetrackError::InvalidObjective(s.to_string()))?;
        Ok(Self::new(key, direction))
    }
}

/// Parses a comma-separated objective list such as `acc:max,latency:min`.
pub fn parse_objectives(list: &str) -> Result<Vec<ObjectiveSpec>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Checks a user selection: 1 to [`MAX_OBJECTIVES`] entries, no repeated key.
///
/// The engine accepts any list; this is only enforced where selections enter
/// from the outside.
pub fn validate_objectives(objectives: &[ObjectiveSpec]) -> Result<()> {
    if objectives.is_empty() || objectives.len() > MAX_OBJECTIVES {
        return Err(ParetrackError::ObjectiveCount(objectives.len()));
    }
    let mut seen = HashSet::new();
    for objective in objectives {
        if !seen.insert(objective.key.as_str()) {
            return Err(ParetrackError::DuplicateObjective(objective.key.clone()));
        }
    }
    Ok(())
}

/// Every input run sorted into exactly one bucket.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrontierAnalysis {
    /// Candidates no other candidate dominates.
    pub frontier: BTreeSet<String>,
    /// Candidates dominated by at least one other candidate.
    pub dominated: BTreeSet<String>,
    /// Runs missing at least one selected objective.
    pub excluded: BTreeSet<String>,
}

impl FrontierAnalysis {
    pub fn is_on_frontier(&self, run_id: &str) -> bool {
        self.frontier.contains(run_id)
    }

    pub fn candidate_count(&self) -> usize {
        self.frontier.len() + self.dominated.len()
    }
}

/// One row of a run's wide `metrics.parquet`: every metric logged at a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetricRow {
    pub step: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, Option<f64>>,
}

impl RunMetricRow {
    pub fn new(values: BTreeMap<String, Option<f64>>, step: Option<u64>) -> Self {
        Self {
            step,
            timestamp: Utc::now(),
            values,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
