//! Error types for apply orchestration.

use thiserror::Error;

use envforge_cluster::ClusterError;
use envforge_manifest::RenderError;

/// Errors that stop an apply before or during dispatch.
///
/// Per-resource failures are not errors: they are reported as
/// [`crate::ApplyOutcome::Failed`] and the batch continues.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Rendering failed, nothing was applied: {0}")]
    Render(#[from] RenderError),

    #[error("Cluster not available: {0}")]
    Unavailable(String),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Apply task failed: {0}")]
    Task(String),
}
