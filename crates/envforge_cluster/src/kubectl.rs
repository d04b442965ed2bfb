//! `kubectl`-backed cluster handle.
//!
//! Namespaces are created with `kubectl create namespace` and every other
//! resource is piped to `kubectl apply -f -`. Failures are classified from
//! stderr into transient and rejected errors.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use envforge_manifest::RenderedManifest;

use crate::error::{ClusterError, ClusterResult};
use crate::handle::ClusterHandle;

static TRANSIENT_STDERR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(connection refused|connection reset|i/o timeout|tls handshake timeout|unable to connect to the server|serviceunavailable|service unavailable|toomanyrequests|too many requests|etcdserver: request timed out|etcdserver: leader changed|the server is currently unable to handle the request)",
    )
    .unwrap()
});

static ALREADY_EXISTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(AlreadyExists|already exists)").unwrap());

/// Classify a failed kubectl call from its stderr.
pub fn classify_stderr(stderr: &str) -> ClusterError {
    let message = stderr.trim().to_string();
    if TRANSIENT_STDERR.is_match(&message) {
        ClusterError::Transient(message)
    } else {
        ClusterError::Rejected(message)
    }
}

/// How kubectl calls are dry-run, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DryRunMode {
    #[default]
    Off,
    /// Send requests with `--dry-run=server`; the API server validates
    /// without persisting.
    Server,
    /// Log the commands without running kubectl.
    LogOnly,
}

/// Options for [`KubectlHandle`].
#[derive(Debug, Clone)]
pub struct KubectlOptions {
    pub binary: String,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub dry_run: DryRunMode,
    /// Allow parallel kubectl processes within a tier.
    pub concurrent: bool,
}

impl Default for KubectlOptions {
    fn default() -> Self {
        Self {
            binary: "kubectl".to_string(),
            context: None,
            kubeconfig: None,
            dry_run: DryRunMode::Off,
            concurrent: true,
        }
    }
}

impl KubectlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn dry_run(mut self, mode: DryRunMode) -> Self {
        self.dry_run = mode;
        self
    }

    pub fn concurrent(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }
}

/// Cluster handle driving the `kubectl` CLI.
pub struct KubectlHandle {
    options: KubectlOptions,
}

impl KubectlHandle {
    pub fn new(options: KubectlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &KubectlOptions {
        &self.options
    }

    /// Global flags followed by the subcommand arguments.
    pub fn build_args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(context) = &self.options.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }

        if let Some(kubeconfig) = &self.options.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.to_string_lossy().to_string());
        }

        args.extend(subcommand.iter().map(|s| s.to_string()));

        if self.options.dry_run == DryRunMode::Server {
            args.push("--dry-run=server".to_string());
        }

        args
    }

    fn format_command(&self, args: &[String]) -> String {
        let mut cmd = self.options.binary.clone();
        for arg in args {
            if arg.contains(' ') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }

    /// Run kubectl with optional stdin. Returns stdout on success.
    async fn run(&self, args: &[String], stdin: Option<&str>) -> ClusterResult<String> {
        debug!("Executing: {}", self.format_command(args));

        let mut cmd = Command::new(&self.options.binary);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ClusterError::Unavailable(format!("failed to spawn {}: {}", self.options.binary, e))
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

#[async_trait]
impl ClusterHandle for KubectlHandle {
    async fn is_available(&self) -> ClusterResult<bool> {
        if self.options.dry_run == DryRunMode::LogOnly {
            return Ok(true);
        }

        let args = self.build_args(&["version", "--request-timeout=5s"]);
        match self.run(&args, None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("kubectl not available: {}", e);
                Ok(false)
            }
        }
    }

    async fn create_namespace(&self, name: &str) -> ClusterResult<()> {
        let args = self.build_args(&["create", "namespace", name]);

        if self.options.dry_run == DryRunMode::LogOnly {
            info!("[DRY-RUN] Would execute: {}", self.format_command(&args));
            return Ok(());
        }

        match self.run(&args, None).await {
            Ok(_) => {
                info!("Created namespace {}", name);
                Ok(())
            }
            Err(ClusterError::Rejected(message)) if ALREADY_EXISTS.is_match(&message) => {
                debug!("Namespace {} already exists", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_resource(&self, manifest: &RenderedManifest) -> ClusterResult<()> {
        let args = self.build_args(&["apply", "-f", "-"]);

        if self.options.dry_run == DryRunMode::LogOnly {
            info!("[DRY-RUN] Would apply {}: {}", manifest.id, self.format_command(&args));
            return Ok(());
        }

        let stdout = self.run(&args, Some(&manifest.content)).await?;
        info!("Applied {}: {}", manifest.id, stdout.trim());
        Ok(())
    }

    fn supports_concurrent_apply(&self) -> bool {
        self.options.concurrent
    }
}
