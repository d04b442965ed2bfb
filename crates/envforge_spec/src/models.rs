//! Data models for environment specs.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// A base64-encoded credential value.
///
/// The provisioner never sees plaintext secrets: values arrive already
/// encoded, either from a spec document's `encoded:` source or from the
/// reader encoding env/file material on the caller's behalf.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedValue(String);

impl EncodedValue {
    /// Wrap a value that is already base64-encoded.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Base64-encode raw credential material.
    pub fn encode(raw: impl AsRef<[u8]>) -> Self {
        Self(STANDARD.encode(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the value, returning `None` if it is not valid base64.
    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(self.0.as_bytes()).ok()
    }
}

impl std::fmt::Debug for EncodedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncodedValue(<redacted>)")
    }
}

/// A named deployment target and everything provisioned into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub name: String,
    pub namespaces: Vec<String>,
    pub credentials: Vec<CredentialSet>,
    pub configs: Vec<ConfigSet>,
    pub services: Vec<ServiceSpec>,
    pub gitops: Option<GitOpsSpec>,
}

impl EnvironmentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
            credentials: Vec::new(),
            configs: Vec::new(),
            services: Vec::new(),
            gitops: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials.push(credentials);
        self
    }

    pub fn with_config(mut self, config: ConfigSet) -> Self {
        self.configs.push(config);
        self
    }

    pub fn with_service(mut self, service: ServiceSpec) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_gitops(mut self, gitops: GitOpsSpec) -> Self {
        self.gitops = Some(gitops);
        self
    }

    pub fn declares_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|n| n == namespace)
    }

    pub fn credential_set(&self, name: &str) -> Option<&CredentialSet> {
        self.credentials.iter().find(|c| c.name == name)
    }

    pub fn config_set(&self, name: &str) -> Option<&ConfigSet> {
        self.configs.iter().find(|c| c.name == name)
    }
}

/// A set of credentials rendered as one Secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, EncodedValue>,
}

impl CredentialSet {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: EncodedValue) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Plain configuration values rendered as one ConfigMap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSet {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigSet {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A deployable service.
///
/// Stateless unless `volume_claim` is set, in which case it is provisioned
/// as a StatefulSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub namespace: String,
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<HttpProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<HttpProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim: Option<VolumeClaimSpec>,
    /// Create a ClusterIP Service in front of the workload.
    #[serde(default)]
    pub expose: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_split: Option<TrafficSplit>,
}

fn default_replicas() -> u32 {
    1
}

impl ServiceSpec {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            image: image.into(),
            replicas: default_replicas(),
            ports: Vec::new(),
            env: Vec::new(),
            resources: None,
            readiness_probe: None,
            liveness_probe: None,
            volume_claim: None,
            expose: false,
            traffic_split: None,
        }
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_port(mut self, port: u32) -> Self {
        self.ports.push(PortSpec { name: None, port });
        self
    }

    pub fn with_env(mut self, binding: EnvBinding) -> Self {
        self.env.push(binding);
        self
    }

    pub fn with_resources(mut self, resources: ResourceRequirements) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_readiness_probe(mut self, probe: HttpProbe) -> Self {
        self.readiness_probe = Some(probe);
        self
    }

    pub fn with_liveness_probe(mut self, probe: HttpProbe) -> Self {
        self.liveness_probe = Some(probe);
        self
    }

    pub fn with_volume_claim(mut self, claim: VolumeClaimSpec) -> Self {
        self.volume_claim = Some(claim);
        self
    }

    pub fn exposed(mut self) -> Self {
        self.expose = true;
        self
    }

    pub fn with_traffic_split(mut self, split: TrafficSplit) -> Self {
        self.traffic_split = Some(split);
        self
    }

    pub fn is_stateful(&self) -> bool {
        self.volume_claim.is_some()
    }

    /// Names of the credential sets this service reads from.
    pub fn secret_refs(&self) -> impl Iterator<Item = &KeyRef> {
        self.env.iter().filter_map(|b| match &b.source {
            EnvSource::Secret(r) => Some(r),
            _ => None,
        })
    }

    /// Names of the config sets this service reads from.
    pub fn config_refs(&self) -> impl Iterator<Item = &KeyRef> {
        self.env.iter().filter_map(|b| match &b.source {
            EnvSource::Config(r) => Some(r),
            _ => None,
        })
    }
}

/// A container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: u32,
}

/// An environment variable binding for a service's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub name: String,
    #[serde(flatten)]
    pub source: EnvSource,
}

impl EnvBinding {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: EnvSource::Value(value.into()),
        }
    }

    pub fn secret(name: impl Into<String>, secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: EnvSource::Secret(KeyRef::new(secret, key)),
        }
    }

    pub fn config(name: impl Into<String>, config: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: EnvSource::Config(KeyRef::new(config, key)),
        }
    }
}

/// Where an environment variable takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvSource {
    Value(String),
    Secret(KeyRef),
    Config(KeyRef),
}

/// Reference to one key of a named Secret or ConfigMap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub name: String,
    pub key: String,
}

impl KeyRef {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Compute resource requests and limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantities>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceQuantities {
    pub fn new(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu: Some(cpu.into()),
            memory: Some(memory.into()),
        }
    }
}

/// HTTP GET probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbe {
    pub path: String,
    pub port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u32>,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>, port: u32) -> Self {
        Self {
            path: path.into(),
            port,
            initial_delay_seconds: None,
            period_seconds: None,
        }
    }
}

/// Persistent volume claim template for stateful services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeClaimSpec {
    pub name: String,
    pub storage: String,
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default = "default_access_mode")]
    pub access_mode: String,
}

fn default_access_mode() -> String {
    "ReadWriteOnce".to_string()
}

impl VolumeClaimSpec {
    pub fn new(
        name: impl Into<String>,
        storage: impl Into<String>,
        mount_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            storage: storage.into(),
            mount_path: mount_path.into(),
            storage_class: None,
            access_mode: default_access_mode(),
        }
    }
}

/// Weighted mesh routing for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSplit {
    pub host: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
    pub routes: Vec<WeightedRoute>,
}

impl TrafficSplit {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            gateways: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateways.push(gateway.into());
        self
    }

    pub fn with_route(mut self, route: WeightedRoute) -> Self {
        self.routes.push(route);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedRoute {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    pub weight: u32,
}

impl WeightedRoute {
    pub fn new(host: impl Into<String>, weight: u32) -> Self {
        Self {
            host: host.into(),
            subset: None,
            port: None,
            weight,
        }
    }

    pub fn with_subset(mut self, subset: impl Into<String>) -> Self {
        self.subset = Some(subset.into());
        self
    }
}

/// GitOps sync configuration, rendered as an Argo CD Application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOpsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    pub repo_url: String,
    pub path: String,
    #[serde(default = "default_target_revision")]
    pub target_revision: String,
    #[serde(default = "default_project")]
    pub project: String,
    /// Namespace the Application object itself lives in.
    #[serde(default = "default_gitops_namespace")]
    pub namespace: String,
    #[serde(default = "default_destination_server")]
    pub destination_server: String,
    pub destination_namespace: String,
    #[serde(default = "default_true")]
    pub auto_sync: bool,
    #[serde(default = "default_true")]
    pub prune: bool,
    #[serde(default = "default_true")]
    pub self_heal: bool,
}

fn default_target_revision() -> String {
    "HEAD".to_string()
}

fn default_project() -> String {
    "default".to_string()
}

fn default_gitops_namespace() -> String {
    "argocd".to_string()
}

fn default_destination_server() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_true() -> bool {
    true
}

impl GitOpsSpec {
    pub fn new(
        repo_url: impl Into<String>,
        path: impl Into<String>,
        destination_namespace: impl Into<String>,
    ) -> Self {
        Self {
            app_name: None,
            repo_url: repo_url.into(),
            path: path.into(),
            target_revision: default_target_revision(),
            project: default_project(),
            namespace: default_gitops_namespace(),
            destination_server: default_destination_server(),
            destination_namespace: destination_namespace.into(),
            auto_sync: true,
            prune: true,
            self_heal: true,
        }
    }

    /// Application name, defaulting to the environment name.
    pub fn app_name_for(&self, environment: &str) -> String {
        self.app_name
            .clone()
            .unwrap_or_else(|| environment.to_string())
    }
}
