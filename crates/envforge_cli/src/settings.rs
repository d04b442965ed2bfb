//! `envforge.toml` settings.
//!
//! Every table and key is optional; missing values fall back to defaults.
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use envforge_apply::ApplyOptions;
use envforge_cluster::{DryRunMode, KubectlOptions};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "envforge.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub kubectl: KubectlSettings,

    #[serde(default)]
    pub apply: ApplySettings,
}

/// Where documents, state and rendered output live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Directory holding `<env>.yaml` spec documents.
    #[serde(default = "PathSettings::default_environments_dir")]
    pub environments_dir: PathBuf,

    /// Directory holding recorded graphs for rollback.
    #[serde(default = "PathSettings::default_state_dir")]
    pub state_dir: PathBuf,

    /// Default output directory for `plan`.
    #[serde(default = "PathSettings::default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            environments_dir: Self::default_environments_dir(),
            state_dir: Self::default_state_dir(),
            output_dir: Self::default_output_dir(),
        }
    }
}

impl PathSettings {
    fn default_environments_dir() -> PathBuf {
        PathBuf::from("environments")
    }

    fn default_state_dir() -> PathBuf {
        PathBuf::from(".envforge/state")
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from("manifests")
    }

    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.environments_dir,
            &mut self.state_dir,
            &mut self.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Dry-run setting as written in the settings file or on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DryRun {
    #[default]
    Off,
    Server,
    Log,
}

impl From<DryRun> for DryRunMode {
    fn from(value: DryRun) -> Self {
        match value {
            DryRun::Off => DryRunMode::Off,
            DryRun::Server => DryRunMode::Server,
            DryRun::Log => DryRunMode::LogOnly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubectlSettings {
    #[serde(default = "KubectlSettings::default_binary")]
    pub binary: String,

    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default)]
    pub dry_run: DryRun,

    /// Run kubectl calls within a tier in parallel.
    #[serde(default = "KubectlSettings::default_concurrent")]
    pub concurrent: bool,
}

impl Default for KubectlSettings {
    fn default() -> Self {
        Self {
            binary: Self::default_binary(),
            context: None,
            kubeconfig: None,
            dry_run: DryRun::Off,
            concurrent: Self::default_concurrent(),
        }
    }
}

impl KubectlSettings {
    fn default_binary() -> String {
        "kubectl".to_string()
    }

    fn default_concurrent() -> bool {
        true
    }
}

/// Retry, timeout and concurrency limits for apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySettings {
    #[serde(default = "ApplySettings::default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "ApplySettings::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "ApplySettings::default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "ApplySettings::default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default = "ApplySettings::default_concurrency")]
    pub concurrency: usize,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
            call_timeout_secs: Self::default_call_timeout_secs(),
            concurrency: Self::default_concurrency(),
        }
    }
}

impl ApplySettings {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_initial_backoff_ms() -> u64 {
        200
    }

    fn default_max_backoff_ms() -> u64 {
        5_000
    }

    fn default_call_timeout_secs() -> u64 {
        60
    }

    fn default_concurrency() -> usize {
        4
    }
}

impl Settings {
    /// Load settings from an explicit file, or from `envforge.toml` in the
    /// working directory if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("No {} found, using default settings", DEFAULT_SETTINGS_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let mut settings = Self::from_toml(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            settings.paths.rebase(base);
        }
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions::new()
            .with_max_attempts(self.apply.max_attempts)
            .with_backoff(
                Duration::from_millis(self.apply.initial_backoff_ms),
                Duration::from_millis(self.apply.max_backoff_ms),
            )
            .with_call_timeout(Duration::from_secs(self.apply.call_timeout_secs))
            .with_concurrency(self.apply.concurrency)
    }

    pub fn kubectl_options(&self) -> KubectlOptions {
        let mut options = KubectlOptions::new()
            .binary(&self.kubectl.binary)
            .dry_run(self.kubectl.dry_run.into())
            .concurrent(self.kubectl.concurrent);
        if let Some(context) = &self.kubectl.context {
            options = options.context(context);
        }
        if let Some(kubeconfig) = &self.kubectl.kubeconfig {
            options = options.kubeconfig(kubeconfig);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.kubectl.binary, "kubectl");
        assert_eq!(settings.apply.max_attempts, 3);
        assert!(settings.kubectl.concurrent);
    }

    #[test]
    fn test_partial_tables() {
        let settings = Settings::from_toml(
            r#"
[kubectl]
context = "kind-dev"
dry_run = "server"

[apply]
max_attempts = 5
concurrency = 1
"#,
        )
        .unwrap();

        assert_eq!(settings.kubectl.context.as_deref(), Some("kind-dev"));
        assert_eq!(settings.kubectl.dry_run, DryRun::Server);
        assert_eq!(settings.apply.max_attempts, 5);
        assert_eq!(settings.apply.concurrency, 1);
        assert_eq!(settings.apply.call_timeout_secs, 60);
        assert_eq!(settings.paths, PathSettings::default());

        let options = settings.apply_options();
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.concurrency, 1);

        let kubectl = settings.kubectl_options();
        assert_eq!(kubectl.context.as_deref(), Some("kind-dev"));
        assert_eq!(kubectl.dry_run, DryRunMode::Server);
    }

    #[test]
    fn test_unknown_dry_run_rejected() {
        assert!(Settings::from_toml("[kubectl]\ndry_run = \"maybe\"\n").is_err());
    }

    #[test]
    fn test_relative_paths_resolved_against_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("envforge.toml");
        fs::write(
            &path,
            "[paths]\nenvironments_dir = \"envs\"\nstate_dir = \"/var/lib/envforge\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.paths.environments_dir, dir.path().join("envs"));
        assert_eq!(settings.paths.state_dir, PathBuf::from("/var/lib/envforge"));
        assert_eq!(settings.paths.output_dir, dir.path().join("manifests"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
