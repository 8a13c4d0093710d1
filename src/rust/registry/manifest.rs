use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Stage;

/// Contents of `registry.json`: every registered model and its versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub models: BTreeMap<String, RegisteredModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisteredModel {
    #[serde(default)]
    pub versions: Vec<ModelVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: u32,
    pub run_id: String,
    #[serde(default)]
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
}

impl RegisteredModel {
    pub fn next_version(&self) -> u32 {
        self.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1
    }

    /// Highest version currently in `stage`.
    pub fn latest_in(&self, stage: Stage) -> Option<&ModelVersion> {
        self.versions
            .iter()
            .filter(|v| v.stage == stage)
            .max_by_key(|v| v.version)
    }

    pub fn version_mut(&mut self, version: u32) -> Option<&mut ModelVersion> {
        self.versions.iter_mut().find(|v| v.version == version)
    }
}

/// Parameters and metrics of one training run, stored as `runs/<id>/run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl RunRecord {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().simple().to_string(),
            experiment: experiment.into(),
            started_at: Utc::now(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
        self.metrics.insert(key.into(), value);
    }
}
