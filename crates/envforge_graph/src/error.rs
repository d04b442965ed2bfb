//! Error types for graph construction and history.

use std::path::PathBuf;
use thiserror::Error;

use envforge_spec::SpecError;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised while building or assembling a resource graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("{resource} in tier {tier} follows a resource in tier {previous}")]
    OutOfOrder {
        resource: String,
        tier: String,
        previous: String,
    },

    #[error("{resource} depends on {dependency}, which does not precede it")]
    DependencyNotBefore { resource: String, dependency: String },

    #[error("Duplicate resource in graph: {0}")]
    DuplicateResource(String),
}

/// Errors raised while recording or loading applied graphs.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("No recorded graph '{id}' for environment '{environment}'")]
    NotFound { environment: String, id: String },

    #[error("Invalid history record at {path}: {message}")]
    InvalidRecord { path: PathBuf, message: String },

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
