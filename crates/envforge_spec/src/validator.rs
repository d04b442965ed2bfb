//! Environment spec validation.
//!
//! Validation runs before any descriptor is derived: a spec that references
//! something it does not declare is rejected as a whole.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{SpecError, SpecResult};
use crate::models::{EnvironmentSpec, ServiceSpec};
use crate::naming::{is_data_key, is_dns1123_label, is_dns1123_subdomain, is_env_var_name, is_valid_port};

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<SpecError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: SpecError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Collapse into a result: one error is returned as-is, several are
    /// wrapped in [`SpecError::Multiple`].
    pub fn into_result(mut self) -> SpecResult<Vec<String>> {
        match self.errors.len() {
            0 => Ok(self.warnings),
            1 => Err(self.errors.remove(0)),
            _ => Err(SpecError::Multiple(self.errors)),
        }
    }
}

/// Validator for environment specs.
pub struct SpecValidator;

impl SpecValidator {
    /// Validate a spec, returning warnings on success.
    pub fn validate(spec: &EnvironmentSpec) -> SpecResult<Vec<String>> {
        let result = Self::check(spec);
        for warning in &result.warnings {
            warn!("{}: {}", spec.name, warning);
        }
        result.into_result()
    }

    /// Run every check and collect all findings.
    pub fn check(spec: &EnvironmentSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if spec.name.is_empty() {
            result.add_error(SpecError::MissingField("name".to_string()));
        }

        Self::check_namespaces(spec, &mut result);
        Self::check_credentials(spec, &mut result);
        Self::check_configs(spec, &mut result);

        let mut seen = HashSet::new();
        for service in &spec.services {
            if !seen.insert((service.namespace.as_str(), service.name.as_str())) {
                result.add_error(SpecError::DuplicateName {
                    kind: "service".to_string(),
                    name: format!("{}/{}", service.namespace, service.name),
                });
            }
            Self::check_service(spec, service, &mut result);
        }

        if let Some(gitops) = &spec.gitops {
            if !spec.declares_namespace(&gitops.destination_namespace) {
                result.add_error(SpecError::UndeclaredNamespace {
                    resource: "GitOps application".to_string(),
                    namespace: gitops.destination_namespace.clone(),
                });
            }
            if !is_dns1123_label(&gitops.namespace) {
                result.add_error(invalid_name("GitOps namespace", &gitops.namespace));
            }
            let app_name = gitops.app_name_for(&spec.name);
            if !is_dns1123_subdomain(&app_name) {
                result.add_error(invalid_name("application", &app_name));
            }
            if gitops.repo_url.is_empty() {
                result.add_error(SpecError::MissingField("gitops.repo_url".to_string()));
            }
        }

        if spec.services.is_empty() {
            result.add_warning("no services declared");
        }

        result
    }

    fn check_namespaces(spec: &EnvironmentSpec, result: &mut ValidationResult) {
        if spec.namespaces.is_empty() {
            result.add_error(SpecError::MissingField("namespaces".to_string()));
        }

        let mut seen = HashSet::new();
        for namespace in &spec.namespaces {
            if !is_dns1123_label(namespace) {
                result.add_error(invalid_name("namespace", namespace));
            }
            if !seen.insert(namespace.as_str()) {
                result.add_error(SpecError::DuplicateName {
                    kind: "namespace".to_string(),
                    name: namespace.clone(),
                });
            }
        }
    }

    fn check_credentials(spec: &EnvironmentSpec, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for set in &spec.credentials {
            if !is_dns1123_subdomain(&set.name) {
                result.add_error(invalid_name("secret", &set.name));
            }
            if !spec.declares_namespace(&set.namespace) {
                result.add_error(SpecError::UndeclaredNamespace {
                    resource: format!("Secret '{}'", set.name),
                    namespace: set.namespace.clone(),
                });
            }
            if !seen.insert(set.name.as_str()) {
                result.add_error(SpecError::DuplicateName {
                    kind: "secret".to_string(),
                    name: set.name.clone(),
                });
            }
            for key in set.data.keys() {
                if !is_data_key(key) {
                    result.add_error(invalid_name("secret key", key));
                }
            }
            if set.data.is_empty() {
                result.add_warning(format!("credential set '{}' has no values", set.name));
            }
        }
    }

    fn check_configs(spec: &EnvironmentSpec, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for set in &spec.configs {
            if !is_dns1123_subdomain(&set.name) {
                result.add_error(invalid_name("config", &set.name));
            }
            if !spec.declares_namespace(&set.namespace) {
                result.add_error(SpecError::UndeclaredNamespace {
                    resource: format!("ConfigMap '{}'", set.name),
                    namespace: set.namespace.clone(),
                });
            }
            if !seen.insert(set.name.as_str()) {
                result.add_error(SpecError::DuplicateName {
                    kind: "config".to_string(),
                    name: set.name.clone(),
                });
            }
            for key in set.data.keys() {
                if !is_data_key(key) {
                    result.add_error(invalid_name("config key", key));
                }
            }
        }
    }

    fn check_service(spec: &EnvironmentSpec, service: &ServiceSpec, result: &mut ValidationResult) {
        // Service objects require a label, which is stricter than a subdomain.
        if !is_dns1123_label(&service.name) {
            result.add_error(invalid_name("service", &service.name));
        }

        if !spec.declares_namespace(&service.namespace) {
            result.add_error(SpecError::UndeclaredNamespace {
                resource: format!("Workload '{}'", service.name),
                namespace: service.namespace.clone(),
            });
        }

        if service.image.is_empty() {
            result.add_error(SpecError::MissingField(format!("services.{}.image", service.name)));
        } else if service.image.ends_with(":latest") || !service.image.contains(':') {
            result.add_warning(format!(
                "service '{}' uses an unpinned image '{}'",
                service.name, service.image
            ));
        }

        if service.replicas == 0 {
            result.add_warning(format!("service '{}' is scaled to zero", service.name));
        }

        let probe_ports = service
            .readiness_probe
            .iter()
            .chain(service.liveness_probe.iter())
            .map(|p| p.port);
        for port in service.ports.iter().map(|p| p.port).chain(probe_ports) {
            if !is_valid_port(port) {
                result.add_error(SpecError::InvalidPort {
                    service: service.name.clone(),
                    port,
                });
            }
        }

        for binding in &service.env {
            if !is_env_var_name(&binding.name) {
                result.add_error(SpecError::InvalidName {
                    field: "environment variable".to_string(),
                    value: binding.name.clone(),
                });
            }
        }

        for secret_ref in service.secret_refs() {
            match spec.credential_set(&secret_ref.name) {
                None => result.add_error(SpecError::UndeclaredSecret {
                    workload: service.name.clone(),
                    secret: secret_ref.name.clone(),
                }),
                Some(set) if !set.data.contains_key(&secret_ref.key) => {
                    result.add_error(SpecError::UndeclaredSecretKey {
                        workload: service.name.clone(),
                        secret: secret_ref.name.clone(),
                        key: secret_ref.key.clone(),
                    })
                }
                Some(set) if set.namespace != service.namespace => {
                    result.add_error(SpecError::UndeclaredSecret {
                        workload: service.name.clone(),
                        secret: format!("{}/{}", service.namespace, secret_ref.name),
                    })
                }
                Some(_) => {}
            }
        }

        for config_ref in service.config_refs() {
            match spec.config_set(&config_ref.name) {
                None => result.add_error(SpecError::UndeclaredConfig {
                    workload: service.name.clone(),
                    config: config_ref.name.clone(),
                }),
                Some(set) if !set.data.contains_key(&config_ref.key) => {
                    result.add_error(SpecError::UndeclaredConfigKey {
                        workload: service.name.clone(),
                        config: config_ref.name.clone(),
                        key: config_ref.key.clone(),
                    })
                }
                Some(set) if set.namespace != service.namespace => {
                    result.add_error(SpecError::UndeclaredConfig {
                        workload: service.name.clone(),
                        config: format!("{}/{}", service.namespace, config_ref.name),
                    })
                }
                Some(_) => {}
            }
        }

        if let Some(claim) = &service.volume_claim {
            if !is_dns1123_subdomain(&claim.name) {
                result.add_error(invalid_name("volume claim", &claim.name));
            }
        }

        if service.expose && service.ports.is_empty() {
            result.add_error(SpecError::MissingField(format!(
                "services.{}.ports",
                service.name
            )));
        }

        if let Some(split) = &service.traffic_split {
            if split.routes.is_empty() {
                result.add_error(SpecError::MissingField(format!(
                    "services.{}.traffic_split.routes",
                    service.name
                )));
            }
        }
    }
}

fn invalid_name(field: &str, value: &str) -> SpecError {
    SpecError::InvalidName {
        field: field.to_string(),
        value: value.to_string(),
    }
}
