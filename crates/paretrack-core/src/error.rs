//! Error types for paretrack-core.
//!
//! The engine itself (`vectors`, `pareto`, `presentation`, `series`) never
//! fails; these errors come from loading event sources and from validating
//! objective selections at the CLI/HTTP boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParetrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid objective '{0}': expected <key>:<maximize|minimize>")]
    InvalidObjective(String),

    #[error("Expected 1 to 3 objectives, got {0}")]
    ObjectiveCount(usize),

    #[error("Objective '{0}' selected more than once")]
    DuplicateObjective(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Unsupported event file format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ParetrackError>;
