//! Helm chart scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use envforge_spec::EnvironmentSpec;

use crate::error::RenderResult;

const DEPLOYMENT_TEMPLATE: &str = r#"{{- range .Values.services }}
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ .name }}
  namespace: {{ .namespace }}
  labels:
    {{- include "envforge.labels" $ | nindent 4 }}
spec:
  replicas: {{ .replicas }}
  selector:
    matchLabels:
      app: {{ .name }}
  template:
    metadata:
      labels:
        app: {{ .name }}
    spec:
      containers:
        - name: {{ .name }}
          image: {{ .image }}
          {{- if .ports }}
          ports:
            {{- range .ports }}
            - containerPort: {{ . }}
            {{- end }}
          {{- end }}
{{- end }}
"#;

const HELPERS_TEMPLATE: &str = r#"{{- define "envforge.name" -}}
{{- .Chart.Name | trunc 63 | trimSuffix "-" }}
{{- end }}

{{- define "envforge.labels" -}}
app.kubernetes.io/name: {{ include "envforge.name" . }}
app.kubernetes.io/managed-by: {{ .Release.Service }}
envforge.io/environment: {{ .Values.environment }}
{{- end }}
"#;

const HELMIGNORE: &str = r#".DS_Store
.git/
.gitignore
*.swp
*.bak
*.tmp
*.orig
*~
.vscode/
.idea/
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartMetadata {
    api_version: String,
    name: String,
    description: String,
    #[serde(rename = "type")]
    chart_type: String,
    version: String,
    app_version: String,
}

#[derive(Serialize)]
struct ChartValues {
    environment: String,
    services: Vec<ServiceValues>,
}

#[derive(Serialize)]
struct ServiceValues {
    name: String,
    namespace: String,
    image: String,
    replicas: u32,
    ports: Vec<u32>,
}

/// Generates a Helm chart skeleton for an environment.
pub struct ChartScaffold {
    chart_version: String,
}

impl Default for ChartScaffold {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartScaffold {
    pub fn new() -> Self {
        Self {
            chart_version: "0.1.0".to_string(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.chart_version = version.into();
        self
    }

    /// Generate the chart under `target_dir/<environment>`.
    ///
    /// Chart files are regenerated on every call; the README is only
    /// written when it does not exist yet.
    pub fn generate(&self, target_dir: &Path, spec: &EnvironmentSpec) -> RenderResult<PathBuf> {
        let chart_dir = target_dir.join(&spec.name);
        info!("Generating Helm chart at {:?}", chart_dir);

        let templates_dir = chart_dir.join("templates");
        fs::create_dir_all(&templates_dir)?;

        self.create_chart_yaml(&chart_dir, spec)?;
        self.create_values_yaml(&chart_dir, spec)?;
        fs::write(templates_dir.join("deployment.yaml"), DEPLOYMENT_TEMPLATE)?;
        fs::write(templates_dir.join("_helpers.tpl"), HELPERS_TEMPLATE)?;
        fs::write(chart_dir.join(".helmignore"), HELMIGNORE)?;
        self.create_readme(&chart_dir, spec)?;

        Ok(chart_dir)
    }

    fn create_chart_yaml(&self, dir: &Path, spec: &EnvironmentSpec) -> RenderResult<()> {
        let chart = ChartMetadata {
            api_version: "v2".to_string(),
            name: spec.name.clone(),
            description: format!("Services of the {} environment", spec.name),
            chart_type: "application".to_string(),
            version: self.chart_version.clone(),
            app_version: self.chart_version.clone(),
        };
        fs::write(dir.join("Chart.yaml"), serde_yaml::to_string(&chart)?)?;
        Ok(())
    }

    fn create_values_yaml(&self, dir: &Path, spec: &EnvironmentSpec) -> RenderResult<()> {
        let values = ChartValues {
            environment: spec.name.clone(),
            services: spec
                .services
                .iter()
                .map(|s| ServiceValues {
                    name: s.name.clone(),
                    namespace: s.namespace.clone(),
                    image: s.image.clone(),
                    replicas: s.replicas,
                    ports: s.ports.iter().map(|p| p.port).collect(),
                })
                .collect(),
        };
        fs::write(dir.join("values.yaml"), serde_yaml::to_string(&values)?)?;
        Ok(())
    }

    fn create_readme(&self, dir: &Path, spec: &EnvironmentSpec) -> RenderResult<()> {
        let path = dir.join("README.md");
        if path.exists() {
            debug!("Keeping existing {:?}", path);
            return Ok(());
        }

        let content = format!(
            r#"# {env}

Helm chart for the services of the `{env}` environment, generated by envforge.

## Install

```bash
helm upgrade --install {env} . --namespace {namespace} --create-namespace
```

## Rollback

Every `envforge apply` records the applied environment under a graph id.
List them and re-apply an earlier one:

```bash
envforge history --env {env}
envforge rollback-to <graph-id> --env {env}
```

Rollback applies the recorded environment forward; resources added since are
not deleted.
"#,
            env = spec.name,
            namespace = spec.namespaces.first().map(String::as_str).unwrap_or("default"),
        );
        fs::write(path, content)?;
        Ok(())
    }
}
