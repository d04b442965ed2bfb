//! Error types for environment specs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while loading or validating an environment spec.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Spec document not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Environment '{name}' not found in {dir}")]
    EnvironmentNotFound { name: String, dir: PathBuf },

    #[error("Document {path} declares environment '{declared}', expected '{expected}'")]
    NameMismatch {
        path: PathBuf,
        declared: String,
        expected: String,
    },

    #[error("Invalid {field} name: '{value}' is not RFC-1123 compliant")]
    InvalidName { field: String, value: String },

    #[error("Service '{service}' declares port {port} outside 1-65535")]
    InvalidPort { service: String, port: u32 },

    #[error("Duplicate {kind} '{name}'")]
    DuplicateName { kind: String, name: String },

    #[error("{resource} references undeclared namespace '{namespace}'")]
    UndeclaredNamespace { resource: String, namespace: String },

    #[error("Workload '{workload}' references undeclared secret '{secret}'")]
    UndeclaredSecret { workload: String, secret: String },

    #[error("Workload '{workload}' references key '{key}' not declared in secret '{secret}'")]
    UndeclaredSecretKey {
        workload: String,
        secret: String,
        key: String,
    },

    #[error("Workload '{workload}' references undeclared config '{config}'")]
    UndeclaredConfig { workload: String, config: String },

    #[error("Workload '{workload}' references key '{key}' not declared in config '{config}'")]
    UndeclaredConfigKey {
        workload: String,
        config: String,
        key: String,
    },

    #[error("Invalid credential source for {set}/{key}: {message}")]
    InvalidCredentialSource {
        set: String,
        key: String,
        message: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("{} spec errors: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<SpecError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_errors(errors: &[SpecError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
