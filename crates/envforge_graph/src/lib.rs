//! # envforge_graph
//!
//! Resource graph construction for envforge.
//!
//! [`GraphBuilder`] validates an environment spec and derives the ordered
//! set of resources it needs, tier by tier: namespaces, then secrets and
//! config, then workloads, then networking, then the GitOps application.
//! [`GraphHistory`] records applied spec documents so an earlier graph can
//! be rebuilt and applied again.
//!
//! ## Example
//!
//! ```rust
//! use envforge_graph::build;
//! use envforge_spec::{EnvironmentSpec, ServiceSpec};
//!
//! let spec = EnvironmentSpec::new("dev")
//!     .with_namespace("dev")
//!     .with_service(ServiceSpec::new("web", "dev", "nginx:1.25").with_port(80));
//!
//! let graph = build(&spec).unwrap();
//! assert_eq!(graph.len(), 2);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod history;

pub use builder::{build, GraphBuilder, ENVIRONMENT_LABEL};
pub use error::{GraphError, GraphResult, HistoryError, HistoryResult};
pub use graph::{GraphNode, ResourceGraph};
pub use history::{GraphHistory, GraphRecord};
