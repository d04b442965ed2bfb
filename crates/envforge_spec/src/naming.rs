//! Kubernetes object naming rules.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SpecError, SpecResult};

static DNS1123_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static DNS1123_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

static ENV_VAR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").unwrap());

static DATA_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").unwrap());

/// Maximum length of an RFC-1123 label (namespaces, services).
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of an RFC-1123 subdomain (most other object names).
pub const MAX_SUBDOMAIN_LEN: usize = 253;

/// Check an RFC-1123 label, as required for namespace and Service names.
pub fn is_dns1123_label(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_LABEL_LEN && DNS1123_LABEL.is_match(value)
}

/// Check an RFC-1123 subdomain, as required for most namespaced object names.
pub fn is_dns1123_subdomain(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_SUBDOMAIN_LEN && DNS1123_SUBDOMAIN.is_match(value)
}

/// Check a container environment variable name.
pub fn is_env_var_name(value: &str) -> bool {
    ENV_VAR_NAME.is_match(value)
}

/// Check a Secret/ConfigMap data key.
pub fn is_data_key(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_SUBDOMAIN_LEN && DATA_KEY.is_match(value)
}

/// Reject environment names that are not RFC-1123 labels. Environment
/// names become file and directory names under the environments and state
/// directories.
pub fn check_environment_name(value: &str) -> SpecResult<()> {
    if is_dns1123_label(value) {
        Ok(())
    } else {
        Err(SpecError::InvalidName {
            field: "environment".to_string(),
            value: value.to_string(),
        })
    }
}

/// Check a container port number.
pub fn is_valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_environment_name() {
        assert!(check_environment_name("staging").is_ok());
        for bad in ["../prod", "dev/../../etc", "", "Prod", "dev.yaml"] {
            let err = check_environment_name(bad).unwrap_err();
            assert!(
                matches!(&err, SpecError::InvalidName { field, value } if field == "environment" && value == bad),
                "{}: {}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_dns1123_label() {
        assert!(is_dns1123_label("dev"));
        assert!(is_dns1123_label("db-secret"));
        assert!(is_dns1123_label("a1"));
        assert!(!is_dns1123_label(""));
        assert!(!is_dns1123_label("Dev"));
        assert!(!is_dns1123_label("-dev"));
        assert!(!is_dns1123_label("dev-"));
        assert!(!is_dns1123_label("my.app"));
        assert!(!is_dns1123_label(&"a".repeat(64)));
    }

    #[test]
    fn test_dns1123_subdomain() {
        assert!(is_dns1123_subdomain("frontend"));
        assert!(is_dns1123_subdomain("frontend.v1"));
        assert!(!is_dns1123_subdomain("frontend..v1"));
        assert!(!is_dns1123_subdomain("front_end"));
    }

    #[test]
    fn test_env_and_data_keys() {
        assert!(is_env_var_name("DB_USER"));
        assert!(!is_env_var_name("1DB"));
        assert!(is_data_key("username"));
        assert!(is_data_key(".dockerconfigjson"));
        assert!(!is_data_key("user name"));
    }

    #[test]
    fn test_port_range() {
        assert!(is_valid_port(80));
        assert!(is_valid_port(65535));
        assert!(!is_valid_port(0));
        assert!(!is_valid_port(65536));
    }
}
