//! Manifest file writing.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::render::RenderedManifest;

/// Name of the combined multi-document stream.
pub const COMBINED_FILE: &str = "all.yaml";

/// Writes rendered manifests to an output directory, one file per resource.
pub struct ManifestWriter {
    output_dir: PathBuf,
}

impl ManifestWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a manifest: `NN-kind_namespace_name.yaml`.
    ///
    /// `_` never appears in kind or RFC-1123 names, so distinct identities
    /// map to distinct names.
    pub fn file_name(manifest: &RenderedManifest) -> String {
        let id = &manifest.id;
        let kind = id.kind.as_str().to_lowercase();
        match &id.namespace {
            Some(ns) => format!("{:02}-{}_{}_{}.yaml", manifest.tier.rank(), kind, ns, id.name),
            None => format!("{:02}-{}_{}.yaml", manifest.tier.rank(), kind, id.name),
        }
    }

    /// Whether a file name is one [`Self::file_name`] could have produced.
    fn is_generated(name: &str) -> bool {
        let bytes = name.as_bytes();
        bytes.len() > 3
            && bytes[0].is_ascii_digit()
            && bytes[1].is_ascii_digit()
            && bytes[2] == b'-'
            && name.ends_with(".yaml")
    }

    /// Write a batch of manifests plus `all.yaml`.
    ///
    /// The batch is checked for duplicate identities and duplicate file
    /// names before anything is written. Generated files left by an earlier
    /// batch are removed. Returns the per-resource paths in batch order.
    pub fn write_all(&self, manifests: &[RenderedManifest]) -> RenderResult<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        for manifest in manifests {
            if !seen.insert(&manifest.id) || !names.insert(Self::file_name(manifest)) {
                return Err(RenderError::DuplicateResource(manifest.id.to_string()));
            }
        }

        fs::create_dir_all(&self.output_dir)?;
        self.remove_stale(&names)?;
        info!("Writing {} manifests to {:?}", manifests.len(), self.output_dir);

        let mut paths = Vec::with_capacity(manifests.len());
        let mut combined = String::new();
        for manifest in manifests {
            let path = self.output_dir.join(Self::file_name(manifest));
            debug!("Writing {} to {:?}", manifest.id, path);
            fs::write(&path, &manifest.content)?;
            paths.push(path);

            combined.push_str("---\n");
            combined.push_str(&manifest.content);
            if !manifest.content.ends_with('\n') {
                combined.push('\n');
            }
        }

        fs::write(self.output_dir.join(COMBINED_FILE), combined)?;
        Ok(paths)
    }

    /// Delete generated files in the output directory that the current
    /// batch does not produce.
    fn remove_stale(&self, current: &HashSet<String>) -> RenderResult<()> {
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if Self::is_generated(name) && !current.contains(name) {
                debug!("Removing stale manifest {:?}", path);
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
