//! Integration tests for the kubectl handle.
//!
//! A shell script stands in for kubectl so the handle's process handling
//! can be checked without a cluster.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use envforge_cluster::{ClusterError, ClusterHandle, KubectlHandle, KubectlOptions};
use envforge_manifest::{RenderedManifest, ResourceId, ResourceKind, Tier};
use tempfile::tempdir;

const FAKE_KUBECTL: &str = r#"#!/bin/sh
dir=$(dirname "$0")
echo "$*" >> "$dir/calls.log"
case "$*" in
  *"create namespace existing"*)
    echo 'Error from server (AlreadyExists): namespaces "existing" already exists' >&2
    exit 1 ;;
  *"create namespace flaky"*)
    echo 'Unable to connect to the server: dial tcp 127.0.0.1:6443: connect: connection refused' >&2
    exit 1 ;;
  *"create namespace Bad"*)
    echo 'The Namespace "Bad" is invalid: metadata.name: Invalid value: "Bad"' >&2
    exit 1 ;;
  *"apply -f -"*)
    cat > "$dir/applied.yaml"
    echo 'configmap/app-config created'
    exit 0 ;;
esac
exit 0
"#;

/// Test namespace creation, stderr classification and stdin piping in one
/// pass against a fake kubectl.
#[tokio::test]
async fn test_kubectl_handle_against_fake_binary() {
    let temp = tempdir().unwrap();
    let script = temp.path().join("kubectl");
    fs::write(&script, FAKE_KUBECTL).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let handle = KubectlHandle::new(
        KubectlOptions::new()
            .binary(script.to_string_lossy().to_string())
            .context("kind-dev"),
    );

    assert!(handle.is_available().await.unwrap());
    handle.create_namespace("dev").await.unwrap();
    handle.create_namespace("existing").await.unwrap();

    let err = handle.create_namespace("flaky").await.unwrap_err();
    assert!(err.is_transient());

    let err = handle.create_namespace("Bad").await.unwrap_err();
    assert!(matches!(err, ClusterError::Rejected(_)));

    let manifest = RenderedManifest {
        id: ResourceId::namespaced(ResourceKind::ConfigMap, "dev", "app-config"),
        tier: Tier::Config,
        content: "apiVersion: v1\nkind: ConfigMap\n".to_string(),
    };
    handle.apply_resource(&manifest).await.unwrap();

    let applied = fs::read_to_string(temp.path().join("applied.yaml")).unwrap();
    assert_eq!(applied, manifest.content);

    let calls = fs::read_to_string(temp.path().join("calls.log")).unwrap();
    assert!(calls.lines().all(|l| l.starts_with("--context kind-dev")));
    assert!(calls.contains("--context kind-dev apply -f -"));
}
