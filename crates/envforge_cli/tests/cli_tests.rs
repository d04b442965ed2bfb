//! End-to-end tests for the envforge binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const DEV: &str = r#"
name: dev
namespaces: [dev]
credentials:
  - name: db-secret
    namespace: dev
    data:
      username:
        encoded: YWRtaW4=
      password:
        file: secrets/db-password
services:
  - name: frontend
    namespace: dev
    image: nginx:latest
    replicas: 2
    ports:
      - port: 80
"#;

const STAGING: &str = r#"
name: staging
namespaces: [dev]
services:
  - name: worker
    namespace: staging
    image: example/worker:2.0
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let envs = dir.path().join("environments");
        fs::create_dir_all(envs.join("secrets")).unwrap();
        fs::write(envs.join("dev.yaml"), DEV).unwrap();
        fs::write(envs.join("staging.yaml"), STAGING).unwrap();
        fs::write(envs.join("secrets/db-password"), "secret123!").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_settings(&self, extra: &str) -> PathBuf {
        let path = self.path().join("envforge.toml");
        fs::write(
            &path,
            format!(
                "[paths]\nenvironments_dir = \"environments\"\nstate_dir = \"state\"\noutput_dir = \"out\"\n\n{}",
                extra
            ),
        )
        .unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_envforge"))
            .args(args)
            .current_dir(self.path())
            .env_remove("ENVFORGE_CONFIG")
            .env_remove("ENVFORGE_CONTEXT")
            .env_remove("ENVFORGE_ENVIRONMENTS_DIR")
            .env_remove("ENVFORGE_STATE_DIR")
            .env("RUST_LOG", "warn")
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_plan_writes_manifests_in_order() {
    let ws = Workspace::new();
    ws.write_settings("");

    let output = ws.run(&["plan", "--env", "dev", "--chart"]);
    assert!(output.status.success(), "{:?}", output);

    let out = ws.path().join("out/dev");
    assert!(out.join("all.yaml").exists());
    assert!(out.join("chart/dev/Chart.yaml").exists());

    let mut files: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".yaml") && name != "all.yaml")
        .collect();
    files.sort();
    assert_eq!(files.len(), 3);
    assert!(files[0].contains("namespace"));
    assert!(files[1].contains("secret"));
    assert!(files[2].contains("deployment"));

    let secret = fs::read_to_string(out.join(&files[1])).unwrap();
    assert!(!secret.contains("secret123!"));

    let text = stdout(&output);
    assert!(text.contains("Namespace/dev"));
    assert!(text.contains("Deployment/dev/frontend"));
}

#[test]
fn test_spec_error_exit_code() {
    let ws = Workspace::new();
    ws.write_settings("");

    let output = ws.run(&["plan", "--env", "staging"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("staging"));
    assert!(!ws.path().join("out/staging").exists());
}

#[test]
fn test_unknown_environment_exit_code() {
    let ws = Workspace::new();
    ws.write_settings("");

    let output = ws.run(&["apply", "--env", "prod", "--dry-run", "log"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_environment_outside_environments_dir_rejected() {
    let ws = Workspace::new();
    ws.write_settings("");
    fs::write(ws.path().join("leaked.yaml"), "name: leaked\nnamespaces: [leaked]\n").unwrap();

    let output = ws.run(&["plan", "--env", "../leaked"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("RFC-1123"));

    let output = ws.run(&["history", "--env", "../environments"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_document_name_must_match_environment() {
    let ws = Workspace::new();
    ws.write_settings("");
    fs::write(
        ws.path().join("environments/qa.yaml"),
        "name: dev\nnamespaces: [dev]\n",
    )
    .unwrap();

    let output = ws.run(&["plan", "--env", "qa"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(!ws.path().join("out/qa").exists());
}

#[test]
fn test_replan_removes_dropped_resources() {
    let ws = Workspace::new();
    ws.write_settings("");
    assert!(ws.run(&["plan", "--env", "dev"]).status.success());
    let out = ws.path().join("out/dev");
    assert!(out.join("02-deployment_dev_frontend.yaml").exists());

    let without_services = DEV.split("services:").next().unwrap().to_string();
    fs::write(ws.path().join("environments/dev.yaml"), without_services).unwrap();

    let output = ws.run(&["plan", "--env", "dev"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(!out.join("02-deployment_dev_frontend.yaml").exists());
    assert!(out.join("01-secret_dev_db-secret.yaml").exists());
    assert!(!fs::read_to_string(out.join("all.yaml")).unwrap().contains("frontend"));
}

#[test]
fn test_log_only_dry_run_does_not_record() {
    let ws = Workspace::new();
    ws.write_settings("[kubectl]\nbinary = \"kubectl-not-installed\"\n");

    let output = ws.run(&["apply", "--env", "dev", "--dry-run", "log"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(stdout(&output).contains("dev: 3 applied, 0 failed, 0 skipped"));

    let history = ws.run(&["history", "--env", "dev", "--json"]);
    assert!(history.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&history.stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 0);
}

#[test]
fn test_unreachable_cluster_exit_code() {
    let ws = Workspace::new();
    ws.write_settings("[kubectl]\nbinary = \"kubectl-not-installed\"\n");

    let output = ws.run(&["apply", "--env", "dev"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_rollback_to_unknown_graph() {
    let ws = Workspace::new();
    ws.write_settings("");

    let output = ws.run(&[
        "rollback-to",
        "00000000-0000-0000-0000-000000000000",
        "--env",
        "dev",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(unix)]
mod with_fake_kubectl {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn install_kubectl(ws: &Workspace, script: &str) -> PathBuf {
        let path = ws.path().join("fake-kubectl");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_apply_history_and_rollback() {
        let ws = Workspace::new();
        let kubectl = install_kubectl(&ws, "#!/bin/sh\ncat > /dev/null\necho configured\n");
        ws.write_settings(&format!("[kubectl]\nbinary = \"{}\"\n", kubectl.display()));

        let output = ws.run(&["apply", "--env", "dev"]);
        assert!(output.status.success(), "{:?}", output);
        assert!(stdout(&output).contains("Recorded graph"));

        let history = ws.run(&["history", "--env", "dev", "--json"]);
        let entries: serde_json::Value = serde_json::from_slice(&history.stdout).unwrap();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["services"], 1);
        let id = entries[0]["id"].as_str().unwrap().to_string();

        let stored = fs::read_to_string(ws.path().join(format!("state/dev/{}.yaml", id))).unwrap();
        assert!(!stored.contains("secret123!"));

        let rollback = ws.run(&["rollback-to", &id, "--env", "dev"]);
        assert!(rollback.status.success(), "{:?}", rollback);
        assert!(stdout(&rollback).contains(&id));

        let history = ws.run(&["history", "--env", "dev", "--json"]);
        let entries: serde_json::Value = serde_json::from_slice(&history.stdout).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_resource_exit_code() {
        let ws = Workspace::new();
        let kubectl = install_kubectl(
            &ws,
            "#!/bin/sh\ncase \"$*\" in\n  *apply*)\n    if grep -q 'kind: Secret'; then\n      echo 'Error from server (Forbidden): secrets is forbidden' >&2\n      exit 1\n    fi\n    ;;\nesac\necho ok\n",
        );
        ws.write_settings(&format!("[kubectl]\nbinary = \"{}\"\n", kubectl.display()));

        let output = ws.run(&["apply", "--env", "dev"]);
        assert_eq!(output.status.code(), Some(5));
        let text = stdout(&output);
        assert!(text.contains("forbidden"));
        assert!(text.contains("dev: 2 applied, 1 failed, 0 skipped"));
    }
}
