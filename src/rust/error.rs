//! Error types for the claims pipeline and prediction service

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorBody;
use crate::validation::{describe_violations, Violation};

/// Failure to resolve or load a model from the registry.
#[derive(Debug, Error)]
#[error("failed to load model '{requested}': {reason}")]
pub struct ModelLoadError {
    /// The identifier that was asked for (`models:/name/Stage` or `runs:/id/model`)
    pub requested: String,
    pub reason: String,
}

impl ModelLoadError {
    pub fn new(requested: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            requested: requested.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure while applying a loaded model to a validated request.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Input did not pass the executor's own shape check
    #[error("input failed shape check: {0}")]
    Shape(String),

    /// The model itself returned an error
    #[error("model invocation failed: {0:#}")]
    Invocation(anyhow::Error),

    /// The model returned the wrong number of values for one row
    #[error("model returned {0} values for a single row")]
    Arity(usize),

    #[error("model returned a non-finite value")]
    NonFinite,

    /// The blocking task running the model was cancelled or panicked
    #[error("prediction task aborted: {0}")]
    Aborted(String),
}

/// Errors from the local model registry store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("registry io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry document {path} is invalid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no registered model named '{0}'")]
    UnknownModel(String),

    #[error("model '{name}' has no version {version}")]
    UnknownVersion { name: String, version: u32 },

    #[error("model '{name}' has no version in stage {stage}")]
    EmptyStage { name: String, stage: String },

    #[error("no run with id '{0}'")]
    UnknownRun(String),

    /// Artifact parsed but its pipeline and regressor do not fit together
    #[error("artifact of run '{run_id}' is invalid: {reason}")]
    InvalidArtifact { run_id: String, reason: String },
}

/// Request-level error classification for the serving endpoint.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Payload could not be parsed into the request shape
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Payload parsed but violated one or more field constraints
    #[error("{}", describe_violations(.0))]
    ValidationViolation(Vec<Violation>),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    /// Reload path could not produce a model; the previous one stays active
    #[error(transparent)]
    ModelUnavailable(#[from] ModelLoadError),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::MalformedRequest(_) | ServeError::ValidationViolation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServeError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServeError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message returned to the caller. Internal causes are summarized, not echoed.
    pub fn detail(&self) -> String {
        match self {
            ServeError::MalformedRequest(_) | ServeError::ValidationViolation(_) => self.to_string(),
            ServeError::Prediction(_) => "prediction failed".to_string(),
            ServeError::ModelUnavailable(err) => {
                format!("model '{}' could not be loaded", err.requested)
            }
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        let err = ServeError::ValidationViolation(vec![Violation::new(
            "age",
            "must be between 0 and 100",
        )]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "age must be between 0 and 100");

        let err = ServeError::MalformedRequest("missing field `bmi`".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.detail().contains("missing field `bmi`"));
    }

    #[test]
    fn test_prediction_errors_do_not_leak_cause() {
        let err = ServeError::from(PredictionError::Invocation(anyhow::anyhow!(
            "matrix shape mismatch at /srv/models/secret"
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "prediction failed");
        assert!(err.to_string().contains("matrix shape mismatch"));
    }

    #[test]
    fn test_model_load_error_carries_requested_identifier() {
        let err = ModelLoadError::new("models:/health_claim_cost_model/Production", "no manifest");
        assert_eq!(err.requested, "models:/health_claim_cost_model/Production");
        assert!(err.to_string().contains("no manifest"));

        let serve = ServeError::from(err);
        assert_eq!(serve.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(serve.detail().contains("health_claim_cost_model"));
    }
}
