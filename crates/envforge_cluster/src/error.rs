//! Error types for cluster operations.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors returned by a cluster handle.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// A failure worth retrying: the API server was unreachable or overloaded.
    #[error("Transient cluster error: {0}")]
    Transient(String),

    /// The cluster refused the request. Retrying will not help.
    #[error("Rejected by cluster: {0}")]
    Rejected(String),

    #[error("Cluster not available: {0}")]
    Unavailable(String),

    #[error("Cluster call timed out after {0} ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    /// Whether the failed call may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClusterError::Transient(_) | ClusterError::Timeout(_))
    }
}
