//! Tiered apply of a resource graph.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use envforge_cluster::{ClusterError, ClusterHandle};
use envforge_graph::ResourceGraph;
use envforge_manifest::{ManifestRenderer, RenderedManifest, ResourceKind};

use crate::error::ApplyError;
use crate::options::ApplyOptions;
use crate::report::{ApplyOutcome, ApplyReport, ApplyResult, ResourceState, StateTracker};

/// Applies resource graphs to a cluster.
pub struct ApplyOrchestrator {
    handle: Arc<dyn ClusterHandle>,
    renderer: ManifestRenderer,
    options: ApplyOptions,
}

impl ApplyOrchestrator {
    pub fn new(handle: Arc<dyn ClusterHandle>) -> Self {
        Self {
            handle,
            renderer: ManifestRenderer::new(),
            options: ApplyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_renderer(mut self, renderer: ManifestRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Apply a graph to completion.
    pub async fn apply(&self, graph: &ResourceGraph) -> Result<ApplyReport, ApplyError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.apply_with_cancel(graph, cancel_rx).await
    }

    /// Apply a graph, stopping dispatch once `cancel` turns true.
    ///
    /// Every manifest is rendered before the first cluster call. Resources
    /// are dispatched batch by batch in graph order; calls already in flight
    /// when cancellation arrives are allowed to finish and only dispatched
    /// resources appear in the returned report.
    pub async fn apply_with_cancel(
        &self,
        graph: &ResourceGraph,
        cancel: watch::Receiver<bool>,
    ) -> Result<ApplyReport, ApplyError> {
        let started_at = Utc::now();
        let manifests = self.renderer.render_all(graph.descriptors())?;

        if !self.handle.is_available().await? {
            return Err(ApplyError::Unavailable(format!(
                "cannot reach the cluster for environment '{}'",
                graph.environment()
            )));
        }

        info!(
            "Applying {} resources to environment '{}'",
            manifests.len(),
            graph.environment()
        );

        let concurrent = self.handle.supports_concurrent_apply() && self.options.concurrency > 1;
        let mut outcomes: Vec<Option<ApplyResult>> = vec![None; manifests.len()];
        let mut cancelled = false;

        for batch in graph.batches() {
            if *cancel.borrow() {
                cancelled = true;
                break;
            }

            let mut ready = Vec::with_capacity(batch.len());
            for position in batch {
                match self.unmet_dependency(graph, &outcomes, position) {
                    Some(reason) => {
                        let id = &manifests[position].id;
                        StateTracker::new(id).transition(ResourceState::Skipped);
                        warn!("Skipping {}: {}", id, reason);
                        outcomes[position] = Some(ApplyResult {
                            id: id.clone(),
                            tier: manifests[position].tier,
                            outcome: ApplyOutcome::Skipped(reason),
                            attempts: 0,
                            duration_ms: 0,
                        });
                    }
                    None => ready.push(position),
                }
            }

            let dispatched = if concurrent && ready.len() > 1 {
                self.dispatch_concurrent(&manifests, ready, &cancel).await?
            } else {
                self.dispatch_sequential(&manifests, ready, &cancel).await
            };

            let batch_cancelled = dispatched.iter().any(Option::is_none);
            for (position, result) in dispatched.into_iter().flatten() {
                outcomes[position] = Some(result);
            }

            if batch_cancelled {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            warn!("Apply of '{}' cancelled", graph.environment());
        }

        let report = ApplyReport {
            environment: graph.environment().to_string(),
            results: outcomes.into_iter().flatten().collect(),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        info!("{}", report.summary());
        Ok(report)
    }

    /// The reason a node cannot be applied, if one of its dependencies did
    /// not end applied.
    fn unmet_dependency(
        &self,
        graph: &ResourceGraph,
        outcomes: &[Option<ApplyResult>],
        position: usize,
    ) -> Option<String> {
        graph.nodes()[position].depends_on.iter().find_map(|dep| {
            let applied = graph
                .position(dep)
                .and_then(|i| outcomes[i].as_ref())
                .map_or(false, |r| r.outcome.is_applied());
            (!applied).then(|| format!("dependency {} was not applied", dep))
        })
    }

    /// Apply positions one at a time. `None` marks a position left
    /// undispatched by cancellation.
    async fn dispatch_sequential(
        &self,
        manifests: &[RenderedManifest],
        ready: Vec<usize>,
        cancel: &watch::Receiver<bool>,
    ) -> Vec<Option<(usize, ApplyResult)>> {
        let mut results = Vec::with_capacity(ready.len());
        for position in ready {
            if *cancel.borrow() {
                results.push(None);
                break;
            }
            let result = apply_one(
                Arc::clone(&self.handle),
                manifests[position].clone(),
                self.options,
            )
            .await;
            results.push(Some((position, result)));
        }
        results
    }

    /// Apply positions on a bounded pool and wait for all of them.
    async fn dispatch_concurrent(
        &self,
        manifests: &[RenderedManifest],
        ready: Vec<usize>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Vec<Option<(usize, ApplyResult)>>, ApplyError> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut join_set = JoinSet::new();

        for position in ready {
            let handle = Arc::clone(&self.handle);
            let manifest = manifests[position].clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let options = self.options;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if *cancel.borrow() {
                    return None;
                }
                Some((position, apply_one(handle, manifest, options).await))
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            results.push(joined.map_err(|e| ApplyError::Task(e.to_string()))?);
        }
        Ok(results)
    }
}

/// Apply one resource, retrying transient failures with backoff.
async fn apply_one(
    handle: Arc<dyn ClusterHandle>,
    manifest: RenderedManifest,
    options: ApplyOptions,
) -> ApplyResult {
    let started = Instant::now();
    let mut tracker = StateTracker::new(&manifest.id);
    let max_attempts = options.attempts();
    let mut attempts = 0;

    let outcome = loop {
        attempts += 1;
        tracker.transition(ResourceState::Applying);
        debug!("Applying {} (attempt {}/{})", manifest.id, attempts, max_attempts);

        let call = async {
            if manifest.id.kind == ResourceKind::Namespace {
                handle.create_namespace(&manifest.id.name).await
            } else {
                handle.apply_resource(&manifest).await
            }
        };
        let result = match tokio::time::timeout(options.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout(options.call_timeout.as_millis() as u64)),
        };

        match result {
            Ok(()) => break ApplyOutcome::Applied,
            Err(e) if e.is_transient() && attempts < max_attempts => {
                let delay = options.backoff_for(attempts);
                warn!(
                    "{} failed transiently (attempt {}/{}), retrying in {:?}: {}",
                    manifest.id, attempts, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => break ApplyOutcome::Failed(e.to_string()),
        }
    };

    tracker.transition(outcome.state());
    match &outcome {
        ApplyOutcome::Applied => info!("Applied {}", manifest.id),
        other => error!("{} {}", manifest.id, other),
    }

    ApplyResult {
        id: manifest.id.clone(),
        tier: manifest.tier,
        outcome,
        attempts,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envforge_cluster::MockCluster;
    use envforge_graph::build;
    use envforge_manifest::ResourceId;
    use envforge_spec::{CredentialSet, EncodedValue, EnvironmentSpec, ServiceSpec};
    use std::time::Duration;

    fn fast() -> ApplyOptions {
        ApplyOptions::new().with_backoff(Duration::from_millis(1), Duration::from_millis(4))
    }

    fn graph() -> ResourceGraph {
        build(
            &EnvironmentSpec::new("dev")
                .with_namespace("dev")
                .with_credentials(
                    CredentialSet::new("db-secret", "dev")
                        .with_value("password", EncodedValue::encode("secret123!")),
                )
                .with_service(ServiceSpec::new("frontend", "dev", "nginx:1.25").with_port(80)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_namespaces_use_create_namespace() {
        let cluster = MockCluster::new();
        let orchestrator = ApplyOrchestrator::new(Arc::new(cluster.clone())).with_options(fast());

        let report = orchestrator.apply(&graph()).await.unwrap();
        assert!(report.success());

        let namespace_calls = cluster.get_method_calls("create_namespace");
        assert_eq!(namespace_calls.len(), 1);
        assert_eq!(namespace_calls[0].resource, ResourceId::namespace("dev"));
        assert_eq!(cluster.get_method_calls("apply_resource").len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_cluster_applies_nothing() {
        let cluster = MockCluster::new().set_available(false);
        let orchestrator = ApplyOrchestrator::new(Arc::new(cluster.clone()));

        let err = orchestrator.apply(&graph()).await.unwrap_err();
        assert!(matches!(err, ApplyError::Unavailable(_)));
        assert_eq!(cluster.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let secret = ResourceId::namespaced(ResourceKind::Secret, "dev", "db-secret");
        let cluster = MockCluster::new().fail_transiently(secret.clone(), 5);
        let orchestrator = ApplyOrchestrator::new(Arc::new(cluster.clone())).with_options(fast());

        let report = orchestrator.apply(&graph()).await.unwrap();
        let result = report.result_for(&secret).unwrap();
        assert!(matches!(result.outcome, ApplyOutcome::Failed(_)));
        assert_eq!(result.attempts, 3);
        assert_eq!(cluster.attempts_for(&secret), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cluster = MockCluster::new();
        let orchestrator = ApplyOrchestrator::new(Arc::new(cluster.clone()));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = orchestrator.apply_with_cancel(&graph(), rx).await.unwrap();
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(cluster.call_count(), 0);
    }
}
