//! # envforge_apply
//!
//! Apply orchestration for envforge.
//!
//! [`ApplyOrchestrator`] renders every manifest of a resource graph up
//! front, then applies the graph tier by tier through a
//! [`envforge_cluster::ClusterHandle`]. Transient failures are retried with
//! exponential backoff. A resource whose dependency did not apply is skipped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use envforge_apply::{ApplyOptions, ApplyOrchestrator};
//! use envforge_cluster::{KubectlHandle, KubectlOptions};
//! use envforge_graph::build;
//! use envforge_spec::{EnvironmentSpec, ServiceSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = EnvironmentSpec::new("dev")
//!         .with_namespace("dev")
//!         .with_service(ServiceSpec::new("web", "dev", "nginx:1.25").with_port(80));
//!     let graph = build(&spec)?;
//!
//!     let handle = Arc::new(KubectlHandle::new(KubectlOptions::new()));
//!     let orchestrator = ApplyOrchestrator::new(handle).with_options(ApplyOptions::default());
//!     let report = orchestrator.apply(&graph).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod options;
pub mod orchestrator;
pub mod report;

pub use error::ApplyError;
pub use options::ApplyOptions;
pub use orchestrator::ApplyOrchestrator;
pub use report::{ApplyOutcome, ApplyReport, ApplyResult, ResourceState};
