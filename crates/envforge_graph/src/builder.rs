//! Deriving a resource graph from an environment spec.

use std::collections::BTreeMap;

use tracing::{debug, info};

use envforge_manifest::{
    selector_labels, ApplicationDescriptor, ConfigMapDescriptor, NamespaceDescriptor,
    ResourceDescriptor, ResourceId, ResourceKind, SecretDescriptor, ServiceDescriptor,
    VirtualServiceDescriptor, WorkloadDescriptor,
};
use envforge_spec::{EnvironmentSpec, ServiceSpec, SpecValidator};

use crate::error::GraphResult;
use crate::graph::{GraphNode, ResourceGraph};

/// Label carrying the environment name on every generated resource.
pub const ENVIRONMENT_LABEL: &str = "envforge.io/environment";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Build the graph for a spec with the default builder.
pub fn build(spec: &EnvironmentSpec) -> GraphResult<ResourceGraph> {
    GraphBuilder::new().build(spec)
}

/// Derives resource graphs from environment specs.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    extra_labels: BTreeMap<String, String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label to every generated resource.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_labels.insert(key.into(), value.into());
        self
    }

    /// Validate an environment spec and derive its graph.
    ///
    /// Nothing is derived when validation fails. The same spec always
    /// yields the same graph.
    pub fn build(&self, spec: &EnvironmentSpec) -> GraphResult<ResourceGraph> {
        SpecValidator::validate(spec)?;
        info!("Building resource graph for environment '{}'", spec.name);

        let labels = self.labels(spec);
        let mut nodes = Vec::new();

        for name in namespaces(spec) {
            nodes.push(GraphNode::new(ResourceDescriptor::Namespace(NamespaceDescriptor {
                name,
                labels: labels.clone(),
            })));
        }

        for set in &spec.credentials {
            nodes.push(
                GraphNode::new(ResourceDescriptor::Secret(SecretDescriptor {
                    name: set.name.clone(),
                    namespace: set.namespace.clone(),
                    data: set.data.clone(),
                    labels: labels.clone(),
                }))
                .with_dependency(ResourceId::namespace(&set.namespace)),
            );
        }

        for set in &spec.configs {
            nodes.push(
                GraphNode::new(ResourceDescriptor::ConfigMap(ConfigMapDescriptor {
                    name: set.name.clone(),
                    namespace: set.namespace.clone(),
                    data: set.data.clone(),
                    labels: labels.clone(),
                }))
                .with_dependency(ResourceId::namespace(&set.namespace)),
            );
        }

        for service in &spec.services {
            nodes.push(workload_node(service, &labels));
        }

        for service in &spec.services {
            let namespace_id = ResourceId::namespace(&service.namespace);

            if service.expose {
                nodes.push(
                    GraphNode::new(ResourceDescriptor::Service(ServiceDescriptor {
                        name: service.name.clone(),
                        namespace: service.namespace.clone(),
                        selector: selector_labels(&service.name),
                        ports: service.ports.clone(),
                        labels: labels.clone(),
                    }))
                    .with_dependency(namespace_id.clone()),
                );
            }

            if let Some(split) = &service.traffic_split {
                let mut node = GraphNode::new(ResourceDescriptor::VirtualService(
                    VirtualServiceDescriptor {
                        name: service.name.clone(),
                        namespace: service.namespace.clone(),
                        host: split.host.clone(),
                        gateways: split.gateways.clone(),
                        routes: split.routes.clone(),
                        labels: labels.clone(),
                    },
                ))
                .with_dependency(namespace_id);
                if service.expose {
                    node = node.with_dependency(ResourceId::namespaced(
                        ResourceKind::Service,
                        &service.namespace,
                        &service.name,
                    ));
                }
                nodes.push(node);
            }
        }

        if let Some(gitops) = &spec.gitops {
            nodes.push(
                GraphNode::new(ResourceDescriptor::Application(ApplicationDescriptor {
                    name: gitops.app_name_for(&spec.name),
                    namespace: gitops.namespace.clone(),
                    project: gitops.project.clone(),
                    repo_url: gitops.repo_url.clone(),
                    path: gitops.path.clone(),
                    target_revision: gitops.target_revision.clone(),
                    destination_server: gitops.destination_server.clone(),
                    destination_namespace: gitops.destination_namespace.clone(),
                    auto_sync: gitops.auto_sync,
                    prune: gitops.prune,
                    self_heal: gitops.self_heal,
                    labels: labels.clone(),
                }))
                .with_dependency(ResourceId::namespace(&gitops.namespace)),
            );
        }

        let graph = ResourceGraph::new(&spec.name, nodes)?;
        debug!("Graph for '{}' has {} resources", spec.name, graph.len());
        Ok(graph)
    }

    fn labels(&self, spec: &EnvironmentSpec) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), "envforge".to_string());
        labels.insert(ENVIRONMENT_LABEL.to_string(), spec.name.clone());
        labels.extend(self.extra_labels.clone());
        labels
    }
}

/// Declared namespaces in order, followed by the GitOps namespace.
fn namespaces(spec: &EnvironmentSpec) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let extra = spec.gitops.as_ref().map(|g| &g.namespace);
    for name in spec.namespaces.iter().chain(extra) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

fn workload_node(service: &ServiceSpec, labels: &BTreeMap<String, String>) -> GraphNode {
    let workload = WorkloadDescriptor {
        name: service.name.clone(),
        namespace: service.namespace.clone(),
        image: service.image.clone(),
        replicas: service.replicas,
        ports: service.ports.clone(),
        env: service.env.clone(),
        resources: service.resources.clone(),
        readiness_probe: service.readiness_probe.clone(),
        liveness_probe: service.liveness_probe.clone(),
        volume_claim: service.volume_claim.clone(),
        labels: labels.clone(),
    };

    let descriptor = if service.is_stateful() {
        ResourceDescriptor::StatefulSet(workload)
    } else {
        ResourceDescriptor::Deployment(workload)
    };

    let mut node = GraphNode::new(descriptor).with_dependency(ResourceId::namespace(&service.namespace));
    for secret in service.secret_refs() {
        node = node.with_dependency(ResourceId::namespaced(
            ResourceKind::Secret,
            &service.namespace,
            &secret.name,
        ));
    }
    for config in service.config_refs() {
        node = node.with_dependency(ResourceId::namespaced(
            ResourceKind::ConfigMap,
            &service.namespace,
            &config.name,
        ));
    }
    node
}
