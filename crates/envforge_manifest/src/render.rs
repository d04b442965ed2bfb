//! Manifest rendering.
//!
//! Rendering is pure. Each descriptor is checked against its kind's rules
//! before being serialized to YAML through the typed API structs.

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use envforge_spec::naming::{is_dns1123_label, is_dns1123_subdomain, is_valid_port};
use envforge_spec::{EncodedValue, EnvSource, HttpProbe};

use crate::api;
use crate::descriptor::{
    ApplicationDescriptor, ConfigMapDescriptor, NamespaceDescriptor, ResourceDescriptor,
    ResourceId, ResourceKind, SecretDescriptor, ServiceDescriptor, Tier, VirtualServiceDescriptor,
    WorkloadDescriptor,
};
use crate::error::{RenderError, RenderResult};

/// Decoded credential values that are never accepted.
pub const DEFAULT_PLACEHOLDERS: &[&str] = &[
    "changeme",
    "change-me",
    "change_me",
    "password",
    "placeholder",
    "secret",
    "todo",
    "xxx",
    "<required>",
    "<redacted>",
];

/// A rendered manifest, keyed by the identity of its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    pub id: ResourceId,
    pub tier: Tier,
    pub content: String,
}

/// Render a descriptor with the default renderer.
pub fn render(descriptor: &ResourceDescriptor) -> RenderResult<String> {
    ManifestRenderer::new().render(descriptor)
}

/// Parse a rendered document back into an API type.
pub fn parse_manifest<T: DeserializeOwned>(content: &str) -> RenderResult<T> {
    Ok(serde_yaml::from_str(content)?)
}

/// Renders resource descriptors into YAML manifests.
pub struct ManifestRenderer {
    placeholders: HashSet<String>,
}

impl Default for ManifestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestRenderer {
    /// Create a renderer rejecting the default placeholder credentials.
    pub fn new() -> Self {
        Self {
            placeholders: DEFAULT_PLACEHOLDERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Also reject the given decoded value as a placeholder credential.
    pub fn with_placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholders.insert(value.into().to_lowercase());
        self
    }

    /// Render one descriptor into a YAML document.
    pub fn render(&self, descriptor: &ResourceDescriptor) -> RenderResult<String> {
        let content = match descriptor {
            ResourceDescriptor::Namespace(d) => to_yaml(&self.namespace(d)?)?,
            ResourceDescriptor::Secret(d) => to_yaml(&self.secret(d)?)?,
            ResourceDescriptor::ConfigMap(d) => to_yaml(&self.config_map(d)?)?,
            ResourceDescriptor::Deployment(d) => to_yaml(&self.deployment(d)?)?,
            ResourceDescriptor::StatefulSet(d) => to_yaml(&self.stateful_set(d)?)?,
            ResourceDescriptor::Service(d) => to_yaml(&self.service(d)?)?,
            ResourceDescriptor::VirtualService(d) => to_yaml(&self.virtual_service(d)?)?,
            ResourceDescriptor::Application(d) => to_yaml(&self.application(d)?)?,
        };
        debug!("Rendered {}", descriptor.id());
        Ok(content)
    }

    /// Render a sequence of descriptors, stopping at the first failure.
    pub fn render_all<'a, I>(&self, descriptors: I) -> RenderResult<Vec<RenderedManifest>>
    where
        I: IntoIterator<Item = &'a ResourceDescriptor>,
    {
        descriptors
            .into_iter()
            .map(|d| {
                Ok(RenderedManifest {
                    id: d.id(),
                    tier: d.tier(),
                    content: self.render(d)?,
                })
            })
            .collect()
    }

    pub fn namespace(&self, d: &NamespaceDescriptor) -> RenderResult<api::Namespace> {
        let id = ResourceId::namespace(&d.name);
        check_label(&id, "name", &d.name)?;

        Ok(api::Namespace {
            api_version: ResourceKind::Namespace.api_version().to_string(),
            kind: ResourceKind::Namespace.as_str().to_string(),
            metadata: api::ObjectMeta {
                name: Some(d.name.clone()),
                namespace: None,
                labels: d.labels.clone(),
            },
        })
    }

    pub fn secret(&self, d: &SecretDescriptor) -> RenderResult<api::Secret> {
        let id = ResourceId::namespaced(ResourceKind::Secret, &d.namespace, &d.name);
        check_metadata(&id, &d.name, &d.namespace)?;

        if d.data.is_empty() {
            return Err(missing(&id, "data"));
        }

        let mut data = BTreeMap::new();
        for (key, value) in &d.data {
            self.check_credential(&id, key, value)?;
            data.insert(key.clone(), value.as_str().to_string());
        }

        Ok(api::Secret {
            api_version: ResourceKind::Secret.api_version().to_string(),
            kind: ResourceKind::Secret.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            type_: "Opaque".to_string(),
            data,
        })
    }

    pub fn config_map(&self, d: &ConfigMapDescriptor) -> RenderResult<api::ConfigMap> {
        let id = ResourceId::namespaced(ResourceKind::ConfigMap, &d.namespace, &d.name);
        check_metadata(&id, &d.name, &d.namespace)?;

        Ok(api::ConfigMap {
            api_version: ResourceKind::ConfigMap.api_version().to_string(),
            kind: ResourceKind::ConfigMap.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            data: d.data.clone(),
        })
    }

    pub fn deployment(&self, d: &WorkloadDescriptor) -> RenderResult<api::Deployment> {
        let id = ResourceId::namespaced(ResourceKind::Deployment, &d.namespace, &d.name);
        let template = self.pod_template(&id, d)?;

        Ok(api::Deployment {
            api_version: ResourceKind::Deployment.api_version().to_string(),
            kind: ResourceKind::Deployment.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            spec: api::DeploymentSpec {
                replicas: d.replicas,
                selector: selector(&d.name),
                template,
            },
        })
    }

    pub fn stateful_set(&self, d: &WorkloadDescriptor) -> RenderResult<api::StatefulSet> {
        let id = ResourceId::namespaced(ResourceKind::StatefulSet, &d.namespace, &d.name);
        let template = self.pod_template(&id, d)?;

        let mut volume_claim_templates = Vec::new();
        if let Some(claim) = &d.volume_claim {
            if !is_dns1123_subdomain(&claim.name) {
                return Err(invalid_name(&id, "volume claim name", &claim.name));
            }
            if claim.storage.is_empty() {
                return Err(missing(&id, "volume_claim.storage"));
            }
            let mut requests = BTreeMap::new();
            requests.insert("storage".to_string(), claim.storage.clone());
            volume_claim_templates.push(api::PersistentVolumeClaim {
                metadata: api::ObjectMeta {
                    name: Some(claim.name.clone()),
                    ..Default::default()
                },
                spec: api::PersistentVolumeClaimSpec {
                    access_modes: vec![claim.access_mode.clone()],
                    storage_class_name: claim.storage_class.clone(),
                    resources: api::VolumeResourceRequirements { requests },
                },
            });
        }

        Ok(api::StatefulSet {
            api_version: ResourceKind::StatefulSet.api_version().to_string(),
            kind: ResourceKind::StatefulSet.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            spec: api::StatefulSetSpec {
                service_name: d.name.clone(),
                replicas: d.replicas,
                selector: selector(&d.name),
                template,
                volume_claim_templates,
            },
        })
    }

    pub fn service(&self, d: &ServiceDescriptor) -> RenderResult<api::Service> {
        let id = ResourceId::namespaced(ResourceKind::Service, &d.namespace, &d.name);
        check_label(&id, "name", &d.name)?;
        check_label(&id, "namespace", &d.namespace)?;

        if d.ports.is_empty() {
            return Err(missing(&id, "ports"));
        }
        if d.selector.is_empty() {
            return Err(missing(&id, "selector"));
        }

        let mut ports = Vec::with_capacity(d.ports.len());
        for port in &d.ports {
            check_port(&id, port.port)?;
            ports.push(api::ServicePort {
                name: port.name.clone(),
                port: port.port,
                target_port: port.port,
            });
        }

        Ok(api::Service {
            api_version: ResourceKind::Service.api_version().to_string(),
            kind: ResourceKind::Service.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            spec: api::ServiceSpec {
                type_: "ClusterIP".to_string(),
                selector: d.selector.clone(),
                ports,
            },
        })
    }

    pub fn virtual_service(&self, d: &VirtualServiceDescriptor) -> RenderResult<api::VirtualService> {
        let id = ResourceId::namespaced(ResourceKind::VirtualService, &d.namespace, &d.name);
        check_metadata(&id, &d.name, &d.namespace)?;

        if d.host.is_empty() {
            return Err(missing(&id, "host"));
        }
        if d.routes.is_empty() {
            return Err(missing(&id, "routes"));
        }

        let total: u64 = d.routes.iter().map(|r| u64::from(r.weight)).sum();
        if total != 100 {
            return Err(RenderError::InvalidWeights {
                resource: id.to_string(),
                host: d.host.clone(),
                total,
            });
        }

        let mut route = Vec::with_capacity(d.routes.len());
        for r in &d.routes {
            if r.host.is_empty() {
                return Err(missing(&id, "routes.host"));
            }
            if let Some(port) = r.port {
                check_port(&id, port)?;
            }
            route.push(api::HttpRouteDestination {
                destination: api::Destination {
                    host: r.host.clone(),
                    subset: r.subset.clone(),
                    port: r.port.map(|number| api::PortSelector { number }),
                },
                weight: r.weight,
            });
        }

        Ok(api::VirtualService {
            api_version: ResourceKind::VirtualService.api_version().to_string(),
            kind: ResourceKind::VirtualService.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            spec: api::VirtualServiceSpec {
                hosts: vec![d.host.clone()],
                gateways: d.gateways.clone(),
                http: vec![api::HttpRoute { route }],
            },
        })
    }

    pub fn application(&self, d: &ApplicationDescriptor) -> RenderResult<api::Application> {
        let id = ResourceId::namespaced(ResourceKind::Application, &d.namespace, &d.name);
        check_metadata(&id, &d.name, &d.namespace)?;
        check_label(&id, "destination namespace", &d.destination_namespace)?;

        for (field, value) in [
            ("repo_url", &d.repo_url),
            ("path", &d.path),
            ("target_revision", &d.target_revision),
            ("destination_server", &d.destination_server),
        ] {
            if value.is_empty() {
                return Err(missing(&id, field));
            }
        }

        let sync_policy = d.auto_sync.then(|| api::SyncPolicy {
            automated: Some(api::AutomatedSync {
                prune: d.prune,
                self_heal: d.self_heal,
            }),
            sync_options: vec!["CreateNamespace=true".to_string()],
        });

        Ok(api::Application {
            api_version: ResourceKind::Application.api_version().to_string(),
            kind: ResourceKind::Application.as_str().to_string(),
            metadata: metadata(&d.name, &d.namespace, &d.labels),
            spec: api::ApplicationSpec {
                project: d.project.clone(),
                source: api::ApplicationSource {
                    repo_url: d.repo_url.clone(),
                    path: d.path.clone(),
                    target_revision: d.target_revision.clone(),
                },
                destination: api::ApplicationDestination {
                    server: d.destination_server.clone(),
                    namespace: d.destination_namespace.clone(),
                },
                sync_policy,
            },
        })
    }

    fn pod_template(&self, id: &ResourceId, d: &WorkloadDescriptor) -> RenderResult<api::PodTemplateSpec> {
        check_metadata(id, &d.name, &d.namespace)?;

        if d.image.trim().is_empty() {
            return Err(missing(id, "image"));
        }

        let mut ports = Vec::with_capacity(d.ports.len());
        for port in &d.ports {
            check_port(id, port.port)?;
            ports.push(api::ContainerPort {
                name: port.name.clone(),
                container_port: port.port,
            });
        }

        let env = d
            .env
            .iter()
            .map(|binding| match &binding.source {
                EnvSource::Value(value) => api::EnvVar {
                    name: binding.name.clone(),
                    value: Some(value.clone()),
                    value_from: None,
                },
                EnvSource::Secret(r) => api::EnvVar {
                    name: binding.name.clone(),
                    value: None,
                    value_from: Some(api::EnvVarSource {
                        secret_key_ref: Some(api::KeySelector {
                            name: r.name.clone(),
                            key: r.key.clone(),
                        }),
                        config_map_key_ref: None,
                    }),
                },
                EnvSource::Config(r) => api::EnvVar {
                    name: binding.name.clone(),
                    value: None,
                    value_from: Some(api::EnvVarSource {
                        secret_key_ref: None,
                        config_map_key_ref: Some(api::KeySelector {
                            name: r.name.clone(),
                            key: r.key.clone(),
                        }),
                    }),
                },
            })
            .collect();

        let readiness_probe = d.readiness_probe.as_ref().map(|p| probe(id, p)).transpose()?;
        let liveness_probe = d.liveness_probe.as_ref().map(|p| probe(id, p)).transpose()?;

        let volume_mounts = d
            .volume_claim
            .iter()
            .map(|claim| api::VolumeMount {
                name: claim.name.clone(),
                mount_path: claim.mount_path.clone(),
            })
            .collect();

        let mut labels = d.labels.clone();
        labels.extend(selector_labels(&d.name));

        Ok(api::PodTemplateSpec {
            metadata: api::ObjectMeta {
                labels,
                ..Default::default()
            },
            spec: api::PodSpec {
                containers: vec![api::Container {
                    name: d.name.clone(),
                    image: d.image.clone(),
                    ports,
                    env,
                    resources: d.resources.clone(),
                    readiness_probe,
                    liveness_probe,
                    volume_mounts,
                }],
            },
        })
    }

    fn check_credential(&self, id: &ResourceId, key: &str, value: &EncodedValue) -> RenderResult<()> {
        let reject = |reason: &str| RenderError::RejectedCredential {
            resource: id.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if value.as_str().trim().is_empty() {
            return Err(reject("value is empty"));
        }
        let decoded = value.decode().ok_or_else(|| reject("value is not valid base64"))?;
        let text = String::from_utf8_lossy(&decoded);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(reject("value decodes to an empty string"));
        }
        if self.placeholders.contains(&trimmed.to_lowercase()) {
            return Err(reject("value is a placeholder"));
        }
        Ok(())
    }
}

/// Labels used to select a workload's pods.
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());
    labels
}

fn selector(name: &str) -> api::LabelSelector {
    api::LabelSelector {
        match_labels: selector_labels(name),
    }
}

fn metadata(name: &str, namespace: &str, labels: &BTreeMap<String, String>) -> api::ObjectMeta {
    api::ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: labels.clone(),
    }
}

fn probe(id: &ResourceId, p: &HttpProbe) -> RenderResult<api::Probe> {
    check_port(id, p.port)?;
    if !p.path.starts_with('/') {
        return Err(missing(id, "probe path starting with '/'"));
    }
    Ok(api::Probe {
        http_get: api::HttpGetAction {
            path: p.path.clone(),
            port: p.port,
        },
        initial_delay_seconds: p.initial_delay_seconds,
        period_seconds: p.period_seconds,
    })
}

fn to_yaml<T: Serialize>(value: &T) -> RenderResult<String> {
    Ok(serde_yaml::to_string(value)?)
}

fn check_metadata(id: &ResourceId, name: &str, namespace: &str) -> RenderResult<()> {
    if !is_dns1123_subdomain(name) {
        return Err(invalid_name(id, "name", name));
    }
    check_label(id, "namespace", namespace)
}

fn check_label(id: &ResourceId, field: &str, value: &str) -> RenderResult<()> {
    if is_dns1123_label(value) {
        Ok(())
    } else {
        Err(invalid_name(id, field, value))
    }
}

fn check_port(id: &ResourceId, port: u32) -> RenderResult<()> {
    if is_valid_port(port) {
        Ok(())
    } else {
        Err(RenderError::InvalidPort {
            resource: id.to_string(),
            port,
        })
    }
}

fn invalid_name(id: &ResourceId, field: &str, value: &str) -> RenderError {
    RenderError::InvalidName {
        resource: id.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn missing(id: &ResourceId, field: &str) -> RenderError {
    RenderError::MissingField {
        resource: id.to_string(),
        field: field.to_string(),
    }
}
