//! Mock cluster handle for testing.
//!
//! Captures every call and answers from scripted behavior, so apply logic
//! can be exercised without a cluster.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use envforge_manifest::{RenderedManifest, ResourceId};

use crate::error::{ClusterError, ClusterResult};
use crate::handle::ClusterHandle;

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    pub resource: ResourceId,
    pub content: Option<String>,
}

/// Mock cluster handle.
///
/// Resources are applied successfully unless scripted otherwise. Clones
/// share state, so a test can keep one clone for inspection.
#[derive(Clone)]
pub struct MockCluster {
    available: Arc<RwLock<bool>>,
    concurrent: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Duration>>,
    rejections: Arc<RwLock<HashMap<ResourceId, String>>>,
    transient_failures: Arc<RwLock<HashMap<ResourceId, usize>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    applied: Arc<RwLock<Vec<ResourceId>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            concurrent: Arc::new(RwLock::new(false)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            rejections: Arc::new(RwLock::new(HashMap::new())),
            transient_failures: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            applied: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    /// Report support for concurrent apply.
    pub fn with_concurrency(self, enabled: bool) -> Self {
        *self.concurrent.write() = enabled;
        self
    }

    /// Delay every namespace and apply call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = delay;
        self
    }

    /// Reject every call for a resource.
    pub fn reject(self, id: ResourceId, reason: impl Into<String>) -> Self {
        self.rejections.write().insert(id, reason.into());
        self
    }

    /// Fail the first `times` calls for a resource with a transient error.
    pub fn fail_transiently(self, id: ResourceId, times: usize) -> Self {
        self.transient_failures.write().insert(id, times);
        self
    }

    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Number of calls made for one resource.
    pub fn attempts_for(&self, id: &ResourceId) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| &c.resource == id)
            .count()
    }

    /// Resources applied successfully, in completion order.
    pub fn applied(&self) -> Vec<ResourceId> {
        self.applied.read().clone()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    async fn respond(&self, id: ResourceId) -> ClusterResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.rejections.read().get(&id) {
            return Err(ClusterError::Rejected(reason.clone()));
        }

        if let Some(remaining) = self.transient_failures.write().get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClusterError::Transient(format!("{}: connection refused", id)));
            }
        }

        self.applied.write().push(id);
        Ok(())
    }
}

#[async_trait]
impl ClusterHandle for MockCluster {
    async fn is_available(&self) -> ClusterResult<bool> {
        Ok(*self.available.read())
    }

    async fn create_namespace(&self, name: &str) -> ClusterResult<()> {
        let id = ResourceId::namespace(name);
        self.record_call(CapturedCall {
            method: "create_namespace".to_string(),
            resource: id.clone(),
            content: None,
        });
        self.respond(id).await
    }

    async fn apply_resource(&self, manifest: &RenderedManifest) -> ClusterResult<()> {
        self.record_call(CapturedCall {
            method: "apply_resource".to_string(),
            resource: manifest.id.clone(),
            content: Some(manifest.content.clone()),
        });
        self.respond(manifest.id.clone()).await
    }

    fn supports_concurrent_apply(&self) -> bool {
        *self.concurrent.read()
    }
}
