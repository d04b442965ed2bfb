//! Resource descriptors: kind-tagged descriptions of objects to provision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use envforge_spec::{
    EncodedValue, EnvBinding, HttpProbe, PortSpec, ResourceRequirements, VolumeClaimSpec,
    WeightedRoute,
};

/// Kinds of resources the provisioner knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Namespace,
    Secret,
    ConfigMap,
    Deployment,
    StatefulSet,
    Service,
    VirtualService,
    Application,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::Service => "Service",
            ResourceKind::VirtualService => "VirtualService",
            ResourceKind::Application => "Application",
        }
    }

    /// The `apiVersion` the kind is rendered with.
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Namespace
            | ResourceKind::Secret
            | ResourceKind::ConfigMap
            | ResourceKind::Service => "v1",
            ResourceKind::Deployment | ResourceKind::StatefulSet => "apps/v1",
            ResourceKind::VirtualService => "networking.istio.io/v1beta1",
            ResourceKind::Application => "argoproj.io/v1alpha1",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            ResourceKind::Namespace => Tier::Namespaces,
            ResourceKind::Secret | ResourceKind::ConfigMap => Tier::Config,
            ResourceKind::Deployment | ResourceKind::StatefulSet => Tier::Workloads,
            ResourceKind::Service | ResourceKind::VirtualService => Tier::Networking,
            ResourceKind::Application => Tier::GitOps,
        }
    }

    pub fn is_workload(&self) -> bool {
        matches!(self, ResourceKind::Deployment | ResourceKind::StatefulSet)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Apply-order rank. Resources in a lower tier are applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Namespaces,
    Config,
    Workloads,
    Networking,
    GitOps,
}

impl Tier {
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Namespaces => 0,
            Tier::Config => 1,
            Tier::Workloads => 2,
            Tier::Networking => 3,
            Tier::GitOps => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Namespaces => "namespaces",
            Tier::Config => "config",
            Tier::Workloads => "workloads",
            Tier::Networking => "networking",
            Tier::GitOps => "gitops",
        }
    }

    pub fn all() -> [Tier; 5] {
        [
            Tier::Namespaces,
            Tier::Config,
            Tier::Workloads,
            Tier::Networking,
            Tier::GitOps,
        ]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a resource: kind, namespace (if namespaced) and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Namespace,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDescriptor {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Secret with pre-encoded values only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDescriptor {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, EncodedValue>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapDescriptor {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// Fields shared by Deployments and StatefulSets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub replicas: u32,
    pub ports: Vec<PortSpec>,
    pub env: Vec<EnvBinding>,
    pub resources: Option<ResourceRequirements>,
    pub readiness_probe: Option<HttpProbe>,
    pub liveness_probe: Option<HttpProbe>,
    /// Only rendered for StatefulSets.
    pub volume_claim: Option<VolumeClaimSpec>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<PortSpec>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub host: String,
    pub gateways: Vec<String>,
    pub routes: Vec<WeightedRoute>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    pub name: String,
    pub namespace: String,
    pub project: String,
    pub repo_url: String,
    pub path: String,
    pub target_revision: String,
    pub destination_server: String,
    pub destination_namespace: String,
    pub auto_sync: bool,
    pub prune: bool,
    pub self_heal: bool,
    pub labels: BTreeMap<String, String>,
}

/// A kind-tagged description of one object to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    Namespace(NamespaceDescriptor),
    Secret(SecretDescriptor),
    ConfigMap(ConfigMapDescriptor),
    Deployment(WorkloadDescriptor),
    StatefulSet(WorkloadDescriptor),
    Service(ServiceDescriptor),
    VirtualService(VirtualServiceDescriptor),
    Application(ApplicationDescriptor),
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::Namespace(_) => ResourceKind::Namespace,
            ResourceDescriptor::Secret(_) => ResourceKind::Secret,
            ResourceDescriptor::ConfigMap(_) => ResourceKind::ConfigMap,
            ResourceDescriptor::Deployment(_) => ResourceKind::Deployment,
            ResourceDescriptor::StatefulSet(_) => ResourceKind::StatefulSet,
            ResourceDescriptor::Service(_) => ResourceKind::Service,
            ResourceDescriptor::VirtualService(_) => ResourceKind::VirtualService,
            ResourceDescriptor::Application(_) => ResourceKind::Application,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceDescriptor::Namespace(d) => &d.name,
            ResourceDescriptor::Secret(d) => &d.name,
            ResourceDescriptor::ConfigMap(d) => &d.name,
            ResourceDescriptor::Deployment(d) | ResourceDescriptor::StatefulSet(d) => &d.name,
            ResourceDescriptor::Service(d) => &d.name,
            ResourceDescriptor::VirtualService(d) => &d.name,
            ResourceDescriptor::Application(d) => &d.name,
        }
    }

    /// Namespace of the object, `None` for cluster-scoped kinds.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            ResourceDescriptor::Namespace(_) => None,
            ResourceDescriptor::Secret(d) => Some(&d.namespace),
            ResourceDescriptor::ConfigMap(d) => Some(&d.namespace),
            ResourceDescriptor::Deployment(d) | ResourceDescriptor::StatefulSet(d) => {
                Some(&d.namespace)
            }
            ResourceDescriptor::Service(d) => Some(&d.namespace),
            ResourceDescriptor::VirtualService(d) => Some(&d.namespace),
            ResourceDescriptor::Application(d) => Some(&d.namespace),
        }
    }

    pub fn tier(&self) -> Tier {
        self.kind().tier()
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.kind(), self.namespace(), self.name())
    }
}
