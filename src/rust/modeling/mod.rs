pub mod artifact;
pub mod pipeline;
pub mod ridge;

pub use artifact::ModelArtifact;
pub use pipeline::{FeaturePipeline, StandardScaler, FEATURE_NAMES};
pub use ridge::RidgeRegressor;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::factors::RatingFactors;

/// Anything that maps rating-factor rows to claim-amount estimates.
///
/// Implementations return exactly one value per input row.
pub trait Regressor: Send + Sync {
    fn predict(&self, rows: &[RatingFactors]) -> anyhow::Result<Vec<f64>>;
}

/// The model instance the server is currently answering with.
///
/// Immutable once built; replacement happens by swapping the whole value.
pub struct LoadedModel {
    version: String,
    source: String,
    loaded_at: DateTime<Utc>,
    predictor: Arc<dyn Regressor>,
}

impl LoadedModel {
    pub fn new(
        version: impl Into<String>,
        source: impl Into<String>,
        predictor: Arc<dyn Regressor>,
    ) -> Self {
        Self {
            version: version.into(),
            source: source.into(),
            loaded_at: Utc::now(),
            predictor,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Registry identifier this model was resolved from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn predict(&self, rows: &[RatingFactors]) -> anyhow::Result<Vec<f64>> {
        self.predictor.predict(rows)
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("version", &self.version)
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
