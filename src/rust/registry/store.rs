use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{ModelLoadError, RegistryError};
use crate::modeling::{LoadedModel, ModelArtifact};
use crate::registry::manifest::{Manifest, ModelVersion, RunRecord};
use crate::registry::{ModelRef, ModelResolver, Stage};

const MANIFEST_FILE: &str = "registry.json";
const RUNS_DIR: &str = "runs";
const ARTIFACT_FILE: &str = "model.json";
const RUN_FILE: &str = "run.json";

/// Model registry backed by a directory:
///
/// ```text
/// <root>/registry.json
/// <root>/runs/<run_id>/run.json
/// <root>/runs/<run_id>/model.json
/// ```
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    /// Reads the manifest; a registry that was never written is empty.
    pub fn manifest(&self) -> Result<Manifest, RegistryError> {
        let path = self.manifest_path();
        if path.exists() {
            read_json(&path)
        } else {
            Ok(Manifest::default())
        }
    }

    fn save_manifest(&self, manifest: &Manifest) -> Result<(), RegistryError> {
        write_json(&self.manifest_path(), manifest)
    }

    /// Persists a run's record and trained artifact.
    pub fn log_run(&self, record: &RunRecord, artifact: &ModelArtifact) -> Result<(), RegistryError> {
        let dir = self.run_dir(&record.run_id);
        write_json(&dir.join(RUN_FILE), record)?;
        write_json(&dir.join(ARTIFACT_FILE), artifact)?;
        info!("Logged run {} to {}", record.run_id, dir.display());
        Ok(())
    }

    pub fn run(&self, run_id: &str) -> Result<RunRecord, RegistryError> {
        let path = self.run_dir(run_id).join(RUN_FILE);
        if !path.exists() {
            return Err(RegistryError::UnknownRun(run_id.to_string()));
        }
        read_json(&path)
    }

    pub fn artifact(&self, run_id: &str) -> Result<ModelArtifact, RegistryError> {
        let path = self.run_dir(run_id).join(ARTIFACT_FILE);
        if !path.exists() {
            return Err(RegistryError::UnknownRun(run_id.to_string()));
        }
        let artifact: ModelArtifact = read_json(&path)?;
        artifact
            .check_shape()
            .map_err(|err| RegistryError::InvalidArtifact {
                run_id: run_id.to_string(),
                reason: format!("{:#}", err),
            })?;
        Ok(artifact)
    }

    /// Registers the artifact of `run_id` as the next version of `name`.
    pub fn register(&self, name: &str, run_id: &str) -> Result<ModelVersion, RegistryError> {
        // Fail before touching the manifest if the run was never logged.
        self.run(run_id)?;

        let mut manifest = self.manifest()?;
        let model = manifest.models.entry(name.to_string()).or_default();
        let version = ModelVersion {
            version: model.next_version(),
            run_id: run_id.to_string(),
            stage: Stage::None,
            created_at: Utc::now(),
        };
        model.versions.push(version.clone());
        self.save_manifest(&manifest)?;

        info!("Registered {} version {} from run {}", name, version.version, run_id);
        Ok(version)
    }

    /// Moves a version to `stage`. Promoting to Production archives whatever
    /// version held Production before.
    pub fn transition(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
    ) -> Result<ModelVersion, RegistryError> {
        let mut manifest = self.manifest()?;
        let model = manifest
            .models
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;

        if !model.versions.iter().any(|v| v.version == version) {
            return Err(RegistryError::UnknownVersion {
                name: name.to_string(),
                version,
            });
        }

        if stage == Stage::Production {
            for other in model
                .versions
                .iter_mut()
                .filter(|v| v.version != version && v.stage == Stage::Production)
            {
                info!("Archiving {} version {}", name, other.version);
                other.stage = Stage::Archived;
            }
        }

        let target = model
            .version_mut(version)
            .ok_or_else(|| RegistryError::UnknownVersion {
                name: name.to_string(),
                version,
            })?;
        target.stage = stage;
        let updated = target.clone();
        self.save_manifest(&manifest)?;

        info!("Transitioned {} version {} to {}", name, version, stage);
        Ok(updated)
    }

    /// Highest version of `name` in `stage`.
    pub fn latest(&self, name: &str, stage: Stage) -> Result<ModelVersion, RegistryError> {
        let manifest = self.manifest()?;
        let model = manifest
            .models
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;
        model
            .latest_in(stage)
            .cloned()
            .ok_or_else(|| RegistryError::EmptyStage {
                name: name.to_string(),
                stage: stage.to_string(),
            })
    }

    fn resolve_inner(&self, reference: &ModelRef) -> Result<LoadedModel, RegistryError> {
        let (version, run_id) = match reference {
            ModelRef::Stage { name, stage } => {
                let entry = self.latest(name, *stage)?;
                (format!("{}/{}", name, entry.version), entry.run_id)
            }
            ModelRef::Run { run_id } => (format!("runs/{}", run_id), run_id.clone()),
        };
        let artifact = self.artifact(&run_id)?;
        Ok(LoadedModel::new(version, reference.to_string(), Arc::new(artifact)))
    }
}

impl ModelResolver for LocalRegistry {
    fn resolve(&self, reference: &ModelRef) -> Result<LoadedModel, ModelLoadError> {
        self.resolve_inner(reference)
            .map_err(|err| ModelLoadError::new(reference.to_string(), err))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling temp file and renames, so readers never see a
/// partially written document.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let io_err = |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let contents = serde_json::to_string_pretty(value).map_err(|source| RegistryError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
