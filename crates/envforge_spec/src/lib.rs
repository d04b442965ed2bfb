//! # envforge_spec
//!
//! Environment spec management for envforge.
//!
//! An environment spec describes one deployment target (`dev`, `prod`, ...):
//! the namespaces it owns, its credential and config sets, the services to
//! run and an optional GitOps application. Specs are written as YAML
//! documents whose credentials reference external sources; loading resolves
//! those sources into pre-encoded values.
//!
//! ## Example
//!
//! ```rust,no_run
//! use envforge_spec::{ProcessEnv, SpecReader, SpecValidator};
//!
//! let reader = SpecReader::new("environments");
//! let spec = reader.load("dev", &ProcessEnv).unwrap();
//! SpecValidator::validate(&spec).unwrap();
//! ```

pub mod document;
pub mod error;
pub mod models;
pub mod naming;
pub mod reader;
pub mod validator;

pub use document::{CredentialSetDocument, CredentialSource, ProcessEnv, SecretSource, SpecDocument};
pub use error::{SpecError, SpecResult};
pub use models::{
    ConfigSet, CredentialSet, EncodedValue, EnvBinding, EnvSource, EnvironmentSpec, GitOpsSpec,
    HttpProbe, KeyRef, PortSpec, ResourceQuantities, ResourceRequirements, ServiceSpec,
    TrafficSplit, VolumeClaimSpec, WeightedRoute,
};
pub use reader::SpecReader;
pub use validator::{SpecValidator, ValidationResult};
