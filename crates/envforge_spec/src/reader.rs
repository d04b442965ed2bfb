//! Spec document loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::document::{SecretSource, SpecDocument};
use crate::error::{SpecError, SpecResult};
use crate::models::EnvironmentSpec;
use crate::naming;

/// Loads environment spec documents from an environments directory.
///
/// Environment `dev` lives at `<dir>/dev.yaml` (or `dev.yml`).
pub struct SpecReader {
    environments_dir: PathBuf,
}

impl SpecReader {
    pub fn new(environments_dir: impl Into<PathBuf>) -> Self {
        Self {
            environments_dir: environments_dir.into(),
        }
    }

    pub fn environments_dir(&self) -> &Path {
        &self.environments_dir
    }

    /// Locate the document file for an environment. The name must be an
    /// RFC-1123 label.
    pub fn document_path(&self, environment: &str) -> SpecResult<PathBuf> {
        naming::check_environment_name(environment)?;
        for ext in ["yaml", "yml"] {
            let path = self.environments_dir.join(format!("{}.{}", environment, ext));
            if path.exists() {
                return Ok(path);
            }
        }
        Err(SpecError::EnvironmentNotFound {
            name: environment.to_string(),
            dir: self.environments_dir.clone(),
        })
    }

    /// Read the unresolved document for an environment. The document's
    /// `name` must match the environment it was looked up by.
    pub fn read_document(&self, environment: &str) -> SpecResult<SpecDocument> {
        let path = self.document_path(environment)?;
        let document = Self::read_document_file(&path)?;
        if document.name != environment {
            return Err(SpecError::NameMismatch {
                path,
                declared: document.name,
                expected: environment.to_string(),
            });
        }
        Ok(document)
    }

    /// Read and resolve an environment.
    pub fn load(&self, environment: &str, secrets: &dyn SecretSource) -> SpecResult<EnvironmentSpec> {
        let document = self.read_document(environment)?;
        let spec = document.resolve(&self.environments_dir, secrets)?;
        info!(
            "Loaded environment {} ({} services, {} credential sets)",
            spec.name,
            spec.services.len(),
            spec.credentials.len()
        );
        Ok(spec)
    }

    /// List environment names available in the directory, sorted.
    pub fn list_environments(&self) -> SpecResult<Vec<String>> {
        if !self.environments_dir.exists() {
            return Err(SpecError::NotFound(self.environments_dir.clone()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.environments_dir)? {
            let path = entry?.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if is_yaml {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Parse a document from an explicit path.
    pub fn read_document_file(path: &Path) -> SpecResult<SpecDocument> {
        if !path.exists() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        SpecDocument::from_yaml(&content)
    }
}
