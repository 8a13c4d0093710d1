use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::factors::RatingFactors;
use crate::modeling::pipeline::FeaturePipeline;
use crate::modeling::ridge::RidgeRegressor;
use crate::modeling::Regressor;

/// Trained model as persisted in the registry: the fitted feature pipeline
/// baked together with the regressor, so callers only ever pass raw factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_type: String,
    pub pipeline: FeaturePipeline,
    pub regressor: RidgeRegressor,
    pub trained_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ModelArtifact {
    pub fn new(pipeline: FeaturePipeline, regressor: RidgeRegressor) -> Self {
        Self {
            model_type: "RidgeRegressor".to_string(),
            pipeline,
            regressor,
            trained_at: Utc::now(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Checks that the pipeline and regressor agree on the feature layout,
    /// so a parsed artifact cannot fail only once it is asked to predict.
    pub fn check_shape(&self) -> Result<()> {
        self.pipeline.check_shape()?;
        ensure!(
            self.regressor.coefficients.len() == self.pipeline.width(),
            "regressor has {} coefficients for {} features",
            self.regressor.coefficients.len(),
            self.pipeline.width()
        );
        ensure!(
            self.regressor.intercept.is_finite()
                && self.regressor.coefficients.iter().all(|c| c.is_finite()),
            "regressor weights must be finite"
        );
        Ok(())
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, rows: &[RatingFactors]) -> anyhow::Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let features = self.pipeline.transform(rows)?;
        Ok(self.regressor.predict(&features)?.to_vec())
    }
}
