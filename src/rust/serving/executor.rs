use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::error::PredictionError;
use crate::factors::RatingFactors;
use crate::modeling::LoadedModel;
use crate::serving::metrics::ServingMetrics;
use crate::serving::telemetry::{
    AuditEntry, AuditSink, ACTION_PREDICTION_ERROR, ACTION_PREDICTION_SUCCESS,
};
use crate::validation::describe_violations;

/// Applies a loaded model to one validated row, with explicit
/// measure-call-record instrumentation around the model invocation.
pub struct PredictionExecutor {
    metrics: ServingMetrics,
    audit: Arc<dyn AuditSink>,
    actor: String,
}

impl PredictionExecutor {
    pub fn new(metrics: ServingMetrics, audit: Arc<dyn AuditSink>, actor: impl Into<String>) -> Self {
        Self {
            metrics,
            audit,
            actor: actor.into(),
        }
    }

    pub fn execute(
        &self,
        model: &LoadedModel,
        factors: &RatingFactors,
    ) -> Result<f64, PredictionError> {
        // Upstream validation is not trusted on its own.
        if let Err(violations) = factors.check_ranges() {
            return Err(self.fail(
                model,
                PredictionError::Shape(describe_violations(&violations)),
            ));
        }

        let start = Instant::now();
        let outcome = model.predict(std::slice::from_ref(factors));
        let elapsed = start.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(values) if values.len() != 1 => Err(PredictionError::Arity(values.len())),
            Ok(values) if !values[0].is_finite() => Err(PredictionError::NonFinite),
            Ok(values) => Ok(values[0]),
            Err(err) => Err(PredictionError::Invocation(err)),
        };

        self.metrics.record_prediction(result.is_ok(), elapsed);
        debug!(
            "Model {} invocation took {:.6}s",
            model.version(),
            elapsed
        );

        match result {
            Ok(value) => {
                self.audit.submit(AuditEntry::new(
                    &self.actor,
                    model.version(),
                    ACTION_PREDICTION_SUCCESS,
                ));
                Ok(value)
            }
            Err(err) => Err(self.audit_failure(model, err)),
        }
    }

    /// Failure before the model was invoked: counted as an error, not as a prediction.
    fn fail(&self, model: &LoadedModel, err: PredictionError) -> PredictionError {
        self.metrics.prediction_errors_total.inc();
        self.audit_failure(model, err)
    }

    fn audit_failure(&self, model: &LoadedModel, err: PredictionError) -> PredictionError {
        error!("Prediction error: {}", err);
        self.audit.submit(AuditEntry::new(
            &self.actor,
            model.version(),
            format!("{}: {}", ACTION_PREDICTION_ERROR, err),
        ));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{Gender, Region};
    use crate::modeling::testing::{failing_model, fixed_model, RaggedRegressor};
    use crate::serving::telemetry::MemorySink;

    fn factors() -> RatingFactors {
        RatingFactors {
            age: 35,
            bmi: 25.5,
            children: 2,
            smoker: false,
            region: Region::Southwest,
            gender: Gender::Female,
        }
    }

    fn executor() -> (PredictionExecutor, ServingMetrics, MemorySink) {
        let metrics = ServingMetrics::new().unwrap();
        let sink = MemorySink::new();
        let executor =
            PredictionExecutor::new(metrics.clone(), Arc::new(sink.clone()), "prediction_service");
        (executor, metrics, sink)
    }

    #[test]
    fn test_success_is_counted_and_audited() {
        let (executor, metrics, sink) = executor();
        let model = fixed_model(7000.0, "claims/3");

        let value = executor.execute(&model, &factors()).unwrap();
        assert_eq!(value, 7000.0);
        assert_eq!(metrics.predictions_total.get(), 1);
        assert_eq!(metrics.prediction_errors_total.get(), 0);
        assert_eq!(metrics.prediction_latency_seconds.get_sample_count(), 1);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "prediction_success");
        assert_eq!(entries[0].subject, "claims/3");
    }

    #[test]
    fn test_model_failure_is_classified_and_reraised() {
        let (executor, metrics, sink) = executor();
        let model = failing_model("feature 'bmi' has wrong dtype");

        let err = executor.execute(&model, &factors()).unwrap_err();
        assert!(matches!(err, PredictionError::Invocation(_)));
        assert_eq!(metrics.predictions_total.get(), 1);
        assert_eq!(metrics.prediction_errors_total.get(), 1);

        let actions = sink.actions();
        assert_eq!(actions.len(), 1);
        assert!(actions[0].starts_with("prediction_error: "));
        assert!(actions[0].contains("feature 'bmi' has wrong dtype"));
    }

    #[test]
    fn test_wrong_output_arity_is_an_error() {
        let (executor, metrics, _) = executor();
        let model = LoadedModel::new(
            "ragged/1",
            "test",
            Arc::new(RaggedRegressor(vec![1.0, 2.0])),
        );
        let err = executor.execute(&model, &factors()).unwrap_err();
        assert!(matches!(err, PredictionError::Arity(2)));
        assert_eq!(metrics.prediction_errors_total.get(), 1);
    }

    #[test]
    fn test_non_finite_output_is_not_substituted() {
        let (executor, _, _) = executor();
        let model = LoadedModel::new(
            "nan/1",
            "test",
            Arc::new(RaggedRegressor(vec![f64::NAN])),
        );
        let err = executor.execute(&model, &factors()).unwrap_err();
        assert!(matches!(err, PredictionError::NonFinite));
    }

    #[test]
    fn test_shape_check_runs_before_model() {
        let (executor, metrics, sink) = executor();
        let model = fixed_model(1.0, "claims/1");
        let mut bad = factors();
        bad.children = 42;

        let err = executor.execute(&model, &bad).unwrap_err();
        assert!(matches!(err, PredictionError::Shape(_)));
        assert_eq!(metrics.predictions_total.get(), 0);
        assert_eq!(metrics.prediction_errors_total.get(), 1);
        assert!(sink.actions()[0].starts_with("prediction_error"));
    }
}
