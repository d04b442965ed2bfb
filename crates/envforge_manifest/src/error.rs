//! Error types for manifest rendering.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while rendering or writing manifests.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{resource}: invalid {field} '{value}'")]
    InvalidName {
        resource: String,
        field: String,
        value: String,
    },

    #[error("{resource}: port {port} outside 1-65535")]
    InvalidPort { resource: String, port: u32 },

    #[error("{resource}: missing required field {field}")]
    MissingField { resource: String, field: String },

    #[error("{resource}: route weights for host '{host}' sum to {total}, expected 100")]
    InvalidWeights {
        resource: String,
        host: String,
        total: u64,
    },

    #[error("{resource}: rejected credential '{key}': {reason}")]
    RejectedCredential {
        resource: String,
        key: String,
        reason: String,
    },

    #[error("Duplicate resource in one write batch: {0}")]
    DuplicateResource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
