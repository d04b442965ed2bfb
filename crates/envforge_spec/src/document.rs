//! On-disk form of an environment spec.
//!
//! A [`SpecDocument`] is what operators write and what graph history stores.
//! It never carries plaintext credentials: each credential value names a
//! source that is resolved at load time into an [`EncodedValue`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::models::{ConfigSet, CredentialSet, EncodedValue, EnvironmentSpec, GitOpsSpec, ServiceSpec};

/// Environment spec document as written in `<env>.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDocument {
    pub name: String,
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialSetDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitops: Option<GitOpsSpec>,
}

/// Credential set whose values are sources rather than values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSetDocument {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, CredentialSource>,
}

/// Where a credential value comes from. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSource {
    /// Already base64-encoded material, e.g. exported from a secret manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded: Option<String>,
    /// Name of a process environment variable holding the raw value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Path of a file holding the raw value. Relative paths resolve against
    /// the document's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl CredentialSource {
    pub fn encoded(value: impl Into<String>) -> Self {
        Self {
            encoded: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn env(var: impl Into<String>) -> Self {
        Self {
            env: Some(var.into()),
            ..Default::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Lookup of caller-provided secret material.
///
/// Abstracted so tests and embedding callers can supply values without
/// touching the process environment.
pub trait SecretSource {
    fn env_var(&self, name: &str) -> Option<String>;
}

/// Reads credential env sources from the process environment.
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl SecretSource for BTreeMap<String, String> {
    fn env_var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl SpecDocument {
    /// Parse a document from YAML text.
    pub fn from_yaml(content: &str) -> SpecResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialize the document back to YAML.
    pub fn to_yaml(&self) -> SpecResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Resolve credential sources into an [`EnvironmentSpec`].
    ///
    /// `base_dir` anchors relative `file:` sources.
    pub fn resolve(&self, base_dir: &Path, secrets: &dyn SecretSource) -> SpecResult<EnvironmentSpec> {
        let mut credentials = Vec::with_capacity(self.credentials.len());

        for set in &self.credentials {
            let mut resolved = CredentialSet::new(&set.name, &set.namespace);
            for (key, source) in &set.data {
                let value = resolve_source(&set.name, key, source, base_dir, secrets)?;
                resolved.data.insert(key.clone(), value);
            }
            debug!("Resolved credential set {} ({} keys)", set.name, resolved.data.len());
            credentials.push(resolved);
        }

        Ok(EnvironmentSpec {
            name: self.name.clone(),
            namespaces: self.namespaces.clone(),
            credentials,
            configs: self.configs.clone(),
            services: self.services.clone(),
            gitops: self.gitops.clone(),
        })
    }
}

fn resolve_source(
    set: &str,
    key: &str,
    source: &CredentialSource,
    base_dir: &Path,
    secrets: &dyn SecretSource,
) -> SpecResult<EncodedValue> {
    let invalid = |message: String| SpecError::InvalidCredentialSource {
        set: set.to_string(),
        key: key.to_string(),
        message,
    };

    match (&source.encoded, &source.env, &source.file) {
        (Some(encoded), None, None) => Ok(EncodedValue::from_encoded(encoded.clone())),
        (None, Some(var), None) => {
            let raw = secrets
                .env_var(var)
                .ok_or_else(|| invalid(format!("environment variable {} is not set", var)))?;
            Ok(EncodedValue::encode(raw))
        }
        (None, None, Some(path)) => {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            let raw = std::fs::read(&path)
                .map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
            Ok(EncodedValue::encode(trim_trailing_newline(&raw)))
        }
        (None, None, None) => Err(invalid("no source given (expected encoded, env or file)".to_string())),
        _ => Err(invalid("more than one source given".to_string())),
    }
}

fn trim_trailing_newline(raw: &[u8]) -> &[u8] {
    let mut end = raw.len();
    while end > 0 && (raw[end - 1] == b'\n' || raw[end - 1] == b'\r') {
        end -= 1;
    }
    &raw[..end]
}
