//! Integration tests for manifest rendering and writing.

use std::collections::BTreeMap;
use std::fs;

use envforge_manifest::api;
use envforge_manifest::{
    parse_manifest, selector_labels, ApplicationDescriptor, ConfigMapDescriptor, ManifestRenderer,
    ManifestWriter, NamespaceDescriptor, ResourceDescriptor, SecretDescriptor, ServiceDescriptor,
    VirtualServiceDescriptor, WorkloadDescriptor, COMBINED_FILE,
};
use envforge_spec::{
    EncodedValue, EnvBinding, HttpProbe, PortSpec, ResourceQuantities, ResourceRequirements,
    VolumeClaimSpec, WeightedRoute,
};
use tempfile::tempdir;

fn dev_batch() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::Namespace(NamespaceDescriptor {
            name: "dev".to_string(),
            labels: BTreeMap::new(),
        }),
        ResourceDescriptor::Secret(SecretDescriptor {
            name: "db-secret".to_string(),
            namespace: "dev".to_string(),
            data: [
                ("username".to_string(), EncodedValue::encode("admin")),
                ("password".to_string(), EncodedValue::encode("secret123!")),
            ]
            .into_iter()
            .collect(),
            labels: BTreeMap::new(),
        }),
        ResourceDescriptor::Deployment(api_workload()),
        ResourceDescriptor::Service(ServiceDescriptor {
            name: "api".to_string(),
            namespace: "dev".to_string(),
            selector: selector_labels("api"),
            ports: vec![PortSpec {
                name: Some("http".to_string()),
                port: 8080,
            }],
            labels: BTreeMap::new(),
        }),
    ]
}

fn api_workload() -> WorkloadDescriptor {
    let mut labels = BTreeMap::new();
    labels.insert("envforge.io/environment".to_string(), "dev".to_string());

    WorkloadDescriptor {
        name: "api".to_string(),
        namespace: "dev".to_string(),
        image: "example/api:1.4.2".to_string(),
        replicas: 3,
        ports: vec![PortSpec {
            name: Some("http".to_string()),
            port: 8080,
        }],
        env: vec![EnvBinding::secret("DB_PASSWORD", "db-secret", "password")],
        resources: Some(ResourceRequirements {
            requests: Some(ResourceQuantities::new("100m", "128Mi")),
            limits: Some(ResourceQuantities::new("500m", "256Mi")),
        }),
        readiness_probe: Some(HttpProbe::new("/healthz", 8080)),
        liveness_probe: None,
        volume_claim: None,
        labels,
    }
}

/// Test that rendered workloads parse back to the same field values.
#[test]
fn test_render_parse_recovers_fields() {
    let renderer = ManifestRenderer::new();
    let workload = api_workload();
    let yaml = renderer.render(&ResourceDescriptor::Deployment(workload.clone())).unwrap();

    let parsed: api::Deployment = parse_manifest(&yaml).unwrap();
    assert_eq!(parsed, renderer.deployment(&workload).unwrap());

    let container = &parsed.spec.template.spec.containers[0];
    assert_eq!(parsed.metadata.name.as_deref(), Some("api"));
    assert_eq!(parsed.metadata.labels["envforge.io/environment"], "dev");
    assert_eq!(parsed.spec.replicas, 3);
    assert_eq!(parsed.spec.selector.match_labels["app"], "api");
    assert_eq!(container.image, "example/api:1.4.2");
    assert_eq!(container.ports[0].container_port, 8080);
    assert_eq!(container.resources, workload.resources);
    assert_eq!(container.readiness_probe.as_ref().unwrap().http_get.path, "/healthz");
    assert!(container.liveness_probe.is_none());
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn round_trip<T: serde::de::DeserializeOwned>(descriptor: ResourceDescriptor) -> T {
    let yaml = ManifestRenderer::new().render(&descriptor).unwrap();
    parse_manifest(&yaml).unwrap()
}

#[test]
fn test_namespace_round_trip() {
    let d = NamespaceDescriptor {
        name: "payments".to_string(),
        labels: labels(&[("istio-injection", "enabled")]),
    };
    let parsed: api::Namespace = round_trip(ResourceDescriptor::Namespace(d.clone()));

    assert_eq!(parsed.api_version, "v1");
    assert_eq!(parsed.kind, "Namespace");
    assert_eq!(parsed.metadata.name.as_deref(), Some(d.name.as_str()));
    assert_eq!(parsed.metadata.namespace, None);
    assert_eq!(parsed.metadata.labels, d.labels);
}

#[test]
fn test_secret_round_trip() {
    let d = SecretDescriptor {
        name: "db-secret".to_string(),
        namespace: "payments".to_string(),
        data: [
            ("username".to_string(), EncodedValue::encode("admin")),
            ("password".to_string(), EncodedValue::encode("s3cr3t!")),
        ]
        .into_iter()
        .collect(),
        labels: labels(&[("team", "payments")]),
    };
    let parsed: api::Secret = round_trip(ResourceDescriptor::Secret(d.clone()));

    assert_eq!(parsed.kind, "Secret");
    assert_eq!(parsed.type_, "Opaque");
    assert_eq!(parsed.metadata.name.as_deref(), Some("db-secret"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.data.len(), d.data.len());
    for (key, value) in &d.data {
        assert_eq!(parsed.data[key], value.as_str());
    }
}

#[test]
fn test_config_map_round_trip() {
    let d = ConfigMapDescriptor {
        name: "app-config".to_string(),
        namespace: "payments".to_string(),
        data: labels(&[("LOG_LEVEL", "debug"), ("feature.flags", "a,b")]),
        labels: labels(&[("team", "payments")]),
    };
    let parsed: api::ConfigMap = round_trip(ResourceDescriptor::ConfigMap(d.clone()));

    assert_eq!(parsed.api_version, "v1");
    assert_eq!(parsed.kind, "ConfigMap");
    assert_eq!(parsed.metadata.name.as_deref(), Some("app-config"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.data, d.data);
}

#[test]
fn test_stateful_set_round_trip() {
    let d = WorkloadDescriptor {
        name: "ledger".to_string(),
        namespace: "payments".to_string(),
        image: "postgres:16".to_string(),
        replicas: 2,
        ports: vec![PortSpec {
            name: Some("pg".to_string()),
            port: 5432,
        }],
        env: vec![
            EnvBinding::value("PGDATA", "/var/lib/postgresql/data/pgdata"),
            EnvBinding::config("LOG_LEVEL", "app-config", "LOG_LEVEL"),
        ],
        resources: None,
        readiness_probe: None,
        liveness_probe: Some(HttpProbe::new("/live", 8081)),
        volume_claim: Some(VolumeClaimSpec {
            name: "data".to_string(),
            storage: "10Gi".to_string(),
            mount_path: "/var/lib/postgresql/data".to_string(),
            storage_class: Some("fast-ssd".to_string()),
            access_mode: "ReadWriteOnce".to_string(),
        }),
        labels: labels(&[("tier", "db")]),
    };
    let parsed: api::StatefulSet = round_trip(ResourceDescriptor::StatefulSet(d.clone()));

    assert_eq!(parsed.api_version, "apps/v1");
    assert_eq!(parsed.kind, "StatefulSet");
    assert_eq!(parsed.metadata.name.as_deref(), Some("ledger"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.spec.service_name, "ledger");
    assert_eq!(parsed.spec.replicas, d.replicas);
    assert_eq!(parsed.spec.selector.match_labels, selector_labels("ledger"));
    assert_eq!(parsed.spec.template.metadata.labels["tier"], "db");
    assert_eq!(parsed.spec.template.metadata.labels["app"], "ledger");

    let container = &parsed.spec.template.spec.containers[0];
    assert_eq!(container.name, "ledger");
    assert_eq!(container.image, d.image);
    assert_eq!(container.ports.len(), 1);
    assert_eq!(container.ports[0].name.as_deref(), Some("pg"));
    assert_eq!(container.ports[0].container_port, 5432);
    assert_eq!(container.env.len(), 2);
    assert_eq!(container.env[0].name, "PGDATA");
    assert_eq!(container.env[0].value.as_deref(), Some("/var/lib/postgresql/data/pgdata"));
    let config_ref = container.env[1]
        .value_from
        .as_ref()
        .and_then(|source| source.config_map_key_ref.as_ref())
        .unwrap();
    assert_eq!(config_ref.name, "app-config");
    assert_eq!(config_ref.key, "LOG_LEVEL");
    assert!(container.resources.is_none());
    assert!(container.readiness_probe.is_none());
    let liveness = container.liveness_probe.as_ref().unwrap();
    assert_eq!(liveness.http_get.path, "/live");
    assert_eq!(liveness.http_get.port, 8081);
    assert_eq!(container.volume_mounts.len(), 1);
    assert_eq!(container.volume_mounts[0].name, "data");
    assert_eq!(container.volume_mounts[0].mount_path, "/var/lib/postgresql/data");

    assert_eq!(parsed.spec.volume_claim_templates.len(), 1);
    let claim = &parsed.spec.volume_claim_templates[0];
    assert_eq!(claim.metadata.name.as_deref(), Some("data"));
    assert_eq!(claim.spec.access_modes, vec!["ReadWriteOnce".to_string()]);
    assert_eq!(claim.spec.storage_class_name.as_deref(), Some("fast-ssd"));
    assert_eq!(claim.spec.resources.requests["storage"], "10Gi");
}

#[test]
fn test_service_round_trip() {
    let d = ServiceDescriptor {
        name: "api".to_string(),
        namespace: "payments".to_string(),
        selector: selector_labels("api"),
        ports: vec![
            PortSpec {
                name: Some("http".to_string()),
                port: 8080,
            },
            PortSpec {
                name: None,
                port: 9090,
            },
        ],
        labels: labels(&[("team", "payments")]),
    };
    let parsed: api::Service = round_trip(ResourceDescriptor::Service(d.clone()));

    assert_eq!(parsed.api_version, "v1");
    assert_eq!(parsed.kind, "Service");
    assert_eq!(parsed.metadata.name.as_deref(), Some("api"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.spec.type_, "ClusterIP");
    assert_eq!(parsed.spec.selector, d.selector);
    assert_eq!(parsed.spec.ports.len(), d.ports.len());
    for (port, declared) in parsed.spec.ports.iter().zip(&d.ports) {
        assert_eq!(port.name, declared.name);
        assert_eq!(port.port, declared.port);
        assert_eq!(port.target_port, declared.port);
    }
}

#[test]
fn test_virtual_service_round_trip() {
    let d = VirtualServiceDescriptor {
        name: "api".to_string(),
        namespace: "payments".to_string(),
        host: "api.payments.svc.cluster.local".to_string(),
        gateways: vec!["istio-system/public".to_string()],
        routes: vec![
            WeightedRoute {
                host: "api".to_string(),
                subset: Some("stable".to_string()),
                port: Some(8080),
                weight: 90,
            },
            WeightedRoute {
                host: "api".to_string(),
                subset: Some("canary".to_string()),
                port: None,
                weight: 10,
            },
        ],
        labels: labels(&[("team", "payments")]),
    };
    let parsed: api::VirtualService = round_trip(ResourceDescriptor::VirtualService(d.clone()));

    assert_eq!(parsed.api_version, "networking.istio.io/v1beta1");
    assert_eq!(parsed.kind, "VirtualService");
    assert_eq!(parsed.metadata.name.as_deref(), Some("api"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.spec.hosts, vec![d.host.clone()]);
    assert_eq!(parsed.spec.gateways, d.gateways);
    assert_eq!(parsed.spec.http.len(), 1);

    let routes = &parsed.spec.http[0].route;
    assert_eq!(routes.len(), d.routes.len());
    for (route, declared) in routes.iter().zip(&d.routes) {
        assert_eq!(route.destination.host, declared.host);
        assert_eq!(route.destination.subset, declared.subset);
        assert_eq!(route.destination.port.as_ref().map(|p| p.number), declared.port);
        assert_eq!(route.weight, declared.weight);
    }
}

#[test]
fn test_application_round_trip() {
    let d = ApplicationDescriptor {
        name: "payments".to_string(),
        namespace: "argocd".to_string(),
        project: "platform".to_string(),
        repo_url: "https://git.example.com/platform/envs.git".to_string(),
        path: "out/payments".to_string(),
        target_revision: "main".to_string(),
        destination_server: "https://kubernetes.default.svc".to_string(),
        destination_namespace: "payments".to_string(),
        auto_sync: true,
        prune: true,
        self_heal: false,
        labels: labels(&[("envforge.io/environment", "payments")]),
    };
    let parsed: api::Application = round_trip(ResourceDescriptor::Application(d.clone()));

    assert_eq!(parsed.api_version, "argoproj.io/v1alpha1");
    assert_eq!(parsed.kind, "Application");
    assert_eq!(parsed.metadata.name.as_deref(), Some("payments"));
    assert_eq!(parsed.metadata.namespace.as_deref(), Some("argocd"));
    assert_eq!(parsed.metadata.labels, d.labels);
    assert_eq!(parsed.spec.project, d.project);
    assert_eq!(parsed.spec.source.repo_url, d.repo_url);
    assert_eq!(parsed.spec.source.path, d.path);
    assert_eq!(parsed.spec.source.target_revision, d.target_revision);
    assert_eq!(parsed.spec.destination.server, d.destination_server);
    assert_eq!(parsed.spec.destination.namespace, d.destination_namespace);

    let automated = parsed
        .spec
        .sync_policy
        .as_ref()
        .and_then(|policy| policy.automated.as_ref())
        .unwrap();
    assert!(automated.prune);
    assert!(!automated.self_heal);

    let manual: api::Application = round_trip(ResourceDescriptor::Application(ApplicationDescriptor {
        auto_sync: false,
        ..d
    }));
    assert!(manual.spec.sync_policy.is_none());
}

/// Test that a whole batch renders and writes one file per resource.
#[test]
fn test_render_and_write_batch() {
    let temp = tempdir().unwrap();
    let batch = dev_batch();

    let manifests = ManifestRenderer::new().render_all(&batch).unwrap();
    assert_eq!(manifests.len(), 4);

    let writer = ManifestWriter::new(temp.path());
    let paths = writer.write_all(&manifests).unwrap();

    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "00-namespace_dev.yaml",
            "01-secret_dev_db-secret.yaml",
            "02-deployment_dev_api.yaml",
            "03-service_dev_api.yaml",
        ]
    );

    let combined = fs::read_to_string(temp.path().join(COMBINED_FILE)).unwrap();
    assert_eq!(combined.matches("---\n").count(), 4);
    assert!(!combined.contains("secret123!"));
}

/// Test that one bad resource fails the whole batch render.
#[test]
fn test_render_all_stops_at_first_error() {
    let mut batch = dev_batch();
    if let ResourceDescriptor::Deployment(workload) = &mut batch[2] {
        workload.image = String::new();
    }

    let err = ManifestRenderer::new().render_all(&batch).unwrap_err();
    assert!(err.to_string().contains("image"));
}
