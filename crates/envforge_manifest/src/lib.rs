//! # envforge_manifest
//!
//! Manifest rendering for envforge.
//!
//! Resources are described by kind-tagged [`ResourceDescriptor`]s and
//! rendered into YAML documents matching the Kubernetes, Istio and Argo CD
//! schemas. Rendering is pure; writing manifests and Helm charts to disk is
//! handled by [`ManifestWriter`] and [`ChartScaffold`].
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use envforge_manifest::{render, NamespaceDescriptor, ResourceDescriptor};
//!
//! let ns = ResourceDescriptor::Namespace(NamespaceDescriptor {
//!     name: "dev".to_string(),
//!     labels: BTreeMap::new(),
//! });
//! let yaml = render(&ns).unwrap();
//! assert!(yaml.contains("kind: Namespace"));
//! ```

pub mod api;
pub mod chart;
pub mod descriptor;
pub mod error;
pub mod render;
pub mod writer;

pub use chart::ChartScaffold;
pub use descriptor::{
    ApplicationDescriptor, ConfigMapDescriptor, NamespaceDescriptor, ResourceDescriptor,
    ResourceId, ResourceKind, SecretDescriptor, ServiceDescriptor, Tier, VirtualServiceDescriptor,
    WorkloadDescriptor,
};
pub use error::{RenderError, RenderResult};
pub use render::{parse_manifest, render, selector_labels, ManifestRenderer, RenderedManifest};
pub use writer::{ManifestWriter, COMBINED_FILE};
