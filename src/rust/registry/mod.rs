pub mod manifest;
pub mod store;

pub use manifest::{Manifest, ModelVersion, RegisteredModel, RunRecord};
pub use store::LocalRegistry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ModelLoadError;
use crate::modeling::LoadedModel;
use crate::serving::telemetry::{AuditEntry, AuditSink, ACTION_MODEL_LOADED};

pub const DEFAULT_MODEL_NAME: &str = "health_claim_cost_model";

/// Deployment status of a registered model version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    None,
    Staging,
    Production,
    Archived,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => Err(format!(
                "unknown stage '{}' (expected None, Staging, Production or Archived)",
                other
            )),
        }
    }
}

/// How a model is addressed in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    /// Highest registered version of `name` currently in `stage`
    Stage { name: String, stage: Stage },
    /// The artifact logged by one training run
    Run { run_id: String },
}

impl ModelRef {
    pub fn production(name: impl Into<String>) -> Self {
        ModelRef::Stage {
            name: name.into(),
            stage: Stage::Production,
        }
    }

    pub fn run(run_id: impl Into<String>) -> Self {
        ModelRef::Run {
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Stage { name, stage } => write!(f, "models:/{}/{}", name, stage),
            ModelRef::Run { run_id } => write!(f, "runs:/{}/model", run_id),
        }
    }
}

/// Resolves a reference to a ready-to-call model.
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, reference: &ModelRef) -> Result<LoadedModel, ModelLoadError>;
}

/// Registry client used by the server: resolves through a [`ModelResolver`]
/// and records an audit entry for every successful load.
#[derive(Clone)]
pub struct RegistryClient {
    resolver: Arc<dyn ModelResolver>,
    audit: Arc<dyn AuditSink>,
    requester: String,
}

impl RegistryClient {
    pub fn new(
        resolver: Arc<dyn ModelResolver>,
        audit: Arc<dyn AuditSink>,
        requester: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            audit,
            requester: requester.into(),
        }
    }

    pub fn load(&self, reference: &ModelRef) -> Result<LoadedModel, ModelLoadError> {
        match self.resolver.resolve(reference) {
            Ok(model) => {
                info!("Loaded model {} from {}", model.version(), reference);
                self.audit.submit(AuditEntry::new(
                    &self.requester,
                    model.version(),
                    ACTION_MODEL_LOADED,
                ));
                Ok(model)
            }
            Err(err) => {
                error!("Error loading model: {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::testing::fixed_model;
    use crate::serving::telemetry::MemorySink;

    struct StubResolver;

    impl ModelResolver for StubResolver {
        fn resolve(&self, reference: &ModelRef) -> Result<LoadedModel, ModelLoadError> {
            match reference {
                ModelRef::Stage { stage: Stage::Production, .. } => {
                    Ok(fixed_model(1.0, "stub/1"))
                }
                other => Err(ModelLoadError::new(other.to_string(), "not found")),
            }
        }
    }

    #[test]
    fn test_stage_parse_is_case_insensitive() {
        assert_eq!("production".parse::<Stage>().unwrap(), Stage::Production);
        assert_eq!("STAGING".parse::<Stage>().unwrap(), Stage::Staging);
        assert!("live".parse::<Stage>().is_err());
    }

    #[test]
    fn test_new_versions_default_to_no_stage() {
        assert_eq!(Stage::default(), Stage::None);
    }

    #[test]
    fn test_model_ref_identifiers() {
        assert_eq!(
            ModelRef::production("claims").to_string(),
            "models:/claims/Production"
        );
        assert_eq!(ModelRef::run("abc").to_string(), "runs:/abc/model");
    }

    #[test]
    fn test_client_audits_successful_load() {
        let sink = MemorySink::new();
        let client = RegistryClient::new(
            Arc::new(StubResolver),
            Arc::new(sink.clone()),
            "prediction_service",
        );

        let model = client.load(&ModelRef::production("claims")).unwrap();
        assert_eq!(model.version(), "stub/1");

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "prediction_service");
        assert_eq!(entries[0].subject, "stub/1");
        assert_eq!(entries[0].action, "model_loaded");
    }

    #[test]
    fn test_client_propagates_load_error() {
        let sink = MemorySink::new();
        let client = RegistryClient::new(
            Arc::new(StubResolver),
            Arc::new(sink.clone()),
            "prediction_service",
        );

        let err = client.load(&ModelRef::run("missing")).unwrap_err();
        assert_eq!(err.requested, "runs:/missing/model");
        assert!(sink.entries().is_empty());
    }
}
