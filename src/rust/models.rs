use chrono::Utc;
use serde::{Deserialize, Serialize};

// HTTP wire models

/// Raw `/predict` payload. Integer fields are signed so out-of-range values
/// reach the validator instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    pub age: i64,
    pub bmi: f64,
    pub children: i64,
    pub smoker: bool,
    pub region: String,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub prediction: f64,
    pub model_version: String,
    pub prediction_time: String,
}

impl PredictionOutput {
    pub fn new(prediction: f64, model_version: impl Into<String>) -> Self {
        Self {
            prediction,
            model_version: model_version.into(),
            prediction_time: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_version: String,
    pub source: String,
    pub loaded_at: String,
}
