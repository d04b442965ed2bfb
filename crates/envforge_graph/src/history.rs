//! Recorded graphs for rollback.
//!
//! Each successful apply can be recorded as the spec document it was built
//! from. Documents hold credential sources, never resolved values, so
//! history files are safe to keep next to the environment definitions.
//! Rolling back rebuilds the graph from a recorded document and applies it
//! forward.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use envforge_spec::{naming, EnvironmentSpec, SecretSource, SpecDocument};

use crate::builder::GraphBuilder;
use crate::error::{GraphResult, HistoryError, HistoryResult};
use crate::graph::ResourceGraph;

/// One recorded graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub id: Uuid,
    pub environment: String,
    pub recorded_at: DateTime<Utc>,
    /// Directory the document was read from, used to resolve file sources.
    pub base_dir: PathBuf,
    pub document: SpecDocument,
}

impl GraphRecord {
    /// Resolve the recorded document back into a spec.
    pub fn resolve(&self, secrets: &dyn SecretSource) -> HistoryResult<EnvironmentSpec> {
        Ok(self.document.resolve(&self.base_dir, secrets)?)
    }

    /// Resolve the document and rebuild its graph.
    pub fn rebuild(&self, builder: &GraphBuilder, secrets: &dyn SecretSource) -> GraphResult<ResourceGraph> {
        let spec = self.document.resolve(&self.base_dir, secrets)?;
        builder.build(&spec)
    }
}

/// Stores graph records under `<state_dir>/<environment>/<id>.yaml`.
pub struct GraphHistory {
    state_dir: PathBuf,
}

impl GraphHistory {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn environment_dir(&self, environment: &str) -> HistoryResult<PathBuf> {
        naming::check_environment_name(environment)?;
        Ok(self.state_dir.join(environment))
    }

    /// Record a document as applied to an environment.
    pub fn record(
        &self,
        environment: &str,
        base_dir: &Path,
        document: &SpecDocument,
    ) -> HistoryResult<GraphRecord> {
        let dir = self.environment_dir(environment)?;
        let record = GraphRecord {
            id: Uuid::new_v4(),
            environment: environment.to_string(),
            recorded_at: Utc::now(),
            base_dir: base_dir.to_path_buf(),
            document: document.clone(),
        };

        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.yaml", record.id));
        debug!("Recording graph {} to {:?}", record.id, path);
        fs::write(&path, serde_yaml::to_string(&record)?)?;

        Ok(record)
    }

    /// All records for an environment, newest first.
    pub fn list(&self, environment: &str) -> HistoryResult<Vec<GraphRecord>> {
        let dir = self.environment_dir(environment)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "yaml") {
                continue;
            }
            match Self::read_record(path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable history record {:?}: {}", path, e),
            }
        }

        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }

    /// The newest record for an environment, if any.
    pub fn latest(&self, environment: &str) -> HistoryResult<Option<GraphRecord>> {
        Ok(self.list(environment)?.into_iter().next())
    }

    /// Load one record by graph id.
    pub fn load(&self, environment: &str, id: &str) -> HistoryResult<GraphRecord> {
        let not_found = || HistoryError::NotFound {
            environment: environment.to_string(),
            id: id.to_string(),
        };

        let dir = self.environment_dir(environment)?;
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        let path = dir.join(format!("{}.yaml", uuid));
        if !path.exists() {
            return Err(not_found());
        }

        let record = Self::read_record(&path)?;
        if record.environment != environment || record.id != uuid {
            return Err(HistoryError::InvalidRecord {
                path,
                message: format!("record belongs to {}/{}", record.environment, record.id),
            });
        }
        Ok(record)
    }

    fn read_record(path: &Path) -> HistoryResult<GraphRecord> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
