//! Cluster handle trait.

use async_trait::async_trait;

use envforge_manifest::RenderedManifest;

use crate::error::ClusterResult;

/// A connection to the cluster that manifests are applied to.
#[async_trait]
pub trait ClusterHandle: Send + Sync {
    /// Check whether the cluster can be reached.
    async fn is_available(&self) -> ClusterResult<bool>;

    /// Create a namespace. An already existing namespace counts as success.
    async fn create_namespace(&self, name: &str) -> ClusterResult<()>;

    /// Submit a rendered manifest for the cluster to reconcile.
    async fn apply_resource(&self, manifest: &RenderedManifest) -> ClusterResult<()>;

    /// Whether independent resources may be applied in parallel.
    fn supports_concurrent_apply(&self) -> bool {
        false
    }
}
