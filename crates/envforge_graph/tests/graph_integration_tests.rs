//! Integration tests for graph building and history.

use std::collections::BTreeMap;
use std::fs;

use tempfile::tempdir;

use envforge_graph::{GraphBuilder, GraphError, GraphHistory};
use envforge_manifest::{ManifestRenderer, ResourceKind};
use envforge_spec::{SpecReader, SpecValidator};

const DEV_YAML: &str = r#"
name: dev
namespaces: [dev]
credentials:
  - name: db-secret
    namespace: dev
    data:
      username:
        encoded: YWRtaW4=
      password:
        env: DB_PASSWORD
services:
  - name: frontend
    namespace: dev
    image: nginx:1.25
    replicas: 2
    ports:
      - port: 80
  - name: api
    namespace: dev
    image: example/api:1.4.2
    ports:
      - port: 8080
    env:
      - name: DB_PASSWORD
        secret:
          name: db-secret
          key: password
    expose: true
    traffic_split:
      host: api
      routes:
        - host: api
          subset: stable
          weight: 80
        - host: api
          subset: canary
          weight: 20
gitops:
  repo_url: https://example.com/deploy.git
  path: envs/dev
  destination_namespace: dev
"#;

fn secrets() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DB_PASSWORD".to_string(), "secret123!".to_string());
    env
}

/// Test that a loaded environment renders completely in graph order.
#[test]
fn test_loaded_environment_renders_in_order() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("dev.yaml"), DEV_YAML).unwrap();

    let spec = SpecReader::new(temp.path()).load("dev", &secrets()).unwrap();
    let graph = GraphBuilder::new().build(&spec).unwrap();
    let manifests = ManifestRenderer::new().render_all(graph.descriptors()).unwrap();

    assert_eq!(manifests.len(), graph.len());
    let tiers: Vec<_> = manifests.iter().map(|m| m.tier).collect();
    let mut sorted = tiers.clone();
    sorted.sort();
    assert_eq!(tiers, sorted);

    let app = manifests.last().unwrap();
    assert_eq!(app.id.kind, ResourceKind::Application);
    assert!(app.content.contains("repoURL"));
}

/// Test that every dependency appears before its dependent.
#[test]
fn test_dependencies_precede_dependents() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("dev.yaml"), DEV_YAML).unwrap();

    let spec = SpecReader::new(temp.path()).load("dev", &secrets()).unwrap();
    let graph = GraphBuilder::new().build(&spec).unwrap();

    for (position, node) in graph.iter().enumerate() {
        for dep in &node.depends_on {
            assert!(graph.position(dep).unwrap() < position, "{} before {}", dep, node.id());
        }
    }
}

/// Test that an invalid spec fails before any resource is derived.
#[test]
fn test_invalid_spec_builds_nothing() {
    let temp = tempdir().unwrap();
    let yaml = DEV_YAML.replace("key: password", "key: token");
    fs::write(temp.path().join("dev.yaml"), yaml).unwrap();

    let spec = SpecReader::new(temp.path()).load("dev", &secrets()).unwrap();
    assert!(!SpecValidator::check(&spec).is_valid());

    let err = GraphBuilder::new().build(&spec).unwrap_err();
    assert!(matches!(err, GraphError::Spec(_)));
    assert!(err.to_string().contains("token"));
}

/// Test that a recorded document rebuilds the same graph.
#[test]
fn test_history_rebuilds_recorded_graph() {
    let temp = tempdir().unwrap();
    let envs = temp.path().join("environments");
    fs::create_dir_all(&envs).unwrap();
    fs::write(envs.join("dev.yaml"), DEV_YAML).unwrap();

    let reader = SpecReader::new(&envs);
    let document = reader.read_document("dev").unwrap();
    let builder = GraphBuilder::new();
    let original = builder.build(&reader.load("dev", &secrets()).unwrap()).unwrap();

    let history = GraphHistory::new(temp.path().join("state"));
    let record = history.record("dev", &envs, &document).unwrap();

    let stored = fs::read_to_string(
        temp.path().join("state").join("dev").join(format!("{}.yaml", record.id)),
    )
    .unwrap();
    assert!(stored.contains("env: DB_PASSWORD"));
    assert!(!stored.contains("secret123!"));

    let loaded = history.load("dev", &record.id.to_string()).unwrap();
    let rebuilt = loaded.rebuild(&builder, &secrets()).unwrap();
    assert_eq!(rebuilt, original);
}
