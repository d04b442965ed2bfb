//! # envforge_cluster
//!
//! Cluster handles for envforge.
//!
//! The apply orchestrator talks to a cluster only through the
//! [`ClusterHandle`] trait. Two implementations are provided:
//!
//! - **KubectlHandle**: drives the `kubectl` CLI, with optional context
//!   selection and server-side or log-only dry runs
//! - **MockCluster**: in-memory handle with scripted rejections and
//!   transient failures, for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use envforge_cluster::{ClusterHandle, KubectlHandle, KubectlOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = KubectlHandle::new(KubectlOptions::new().context("kind-dev"));
//!     if handle.is_available().await? {
//!         handle.create_namespace("dev").await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handle;
pub mod kubectl;
pub mod mock;

pub use error::{ClusterError, ClusterResult};
pub use handle::ClusterHandle;
pub use kubectl::{classify_stderr, DryRunMode, KubectlHandle, KubectlOptions};
pub use mock::{CapturedCall, MockCluster};
