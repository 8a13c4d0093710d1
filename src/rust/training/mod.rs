pub mod evaluate;

pub use evaluate::{evaluate, evaluate_model, EvaluationMetrics};

use anyhow::{ensure, Context, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::data::{data_fingerprint, ClaimRecord, TARGET_COLUMN};
use crate::factors::RatingFactors;
use crate::modeling::{FeaturePipeline, ModelArtifact, RidgeRegressor, FEATURE_NAMES};
use crate::registry::{LocalRegistry, ModelVersion, RunRecord, Stage, DEFAULT_MODEL_NAME};
use crate::serving::telemetry::{AuditEntry, AuditSink};

pub const DEFAULT_EXPERIMENT: &str = "health-claim-prediction";
pub const TRAINING_ACTOR: &str = "training_service";

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub experiment: String,
    pub model_name: String,
    pub alpha: f64,
    pub test_fraction: f64,
    pub seed: u64,
    /// Move the new version straight to this stage after registering.
    pub stage: Option<Stage>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            experiment: DEFAULT_EXPERIMENT.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            alpha: 1.0,
            test_fraction: 0.2,
            seed: 42,
            stage: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_id: String,
    pub version: ModelVersion,
    pub metrics: EvaluationMetrics,
}

/// Seeded shuffle, then hold out `ceil(n * test_fraction)` rows.
pub fn train_test_split(
    records: &[ClaimRecord],
    test_fraction: f64,
    seed: u64,
) -> (Vec<ClaimRecord>, Vec<ClaimRecord>) {
    let mut shuffled = records.to_vec();
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
    let test_len = ((records.len() as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let train = shuffled.split_off(test_len.min(shuffled.len()));
    (train, shuffled)
}

/// Fits pipeline and regressor, evaluates on the held-out split, logs the run
/// and registers it as a new model version.
pub fn train(
    records: &[ClaimRecord],
    config: &TrainConfig,
    registry: &LocalRegistry,
    audit: &dyn AuditSink,
) -> Result<TrainOutcome> {
    info!("Starting model training process");
    ensure!(
        (0.0..1.0).contains(&config.test_fraction),
        "test fraction must be in [0, 1), got {}",
        config.test_fraction
    );

    let mut run = RunRecord::new(&config.experiment);
    audit.submit(AuditEntry::new(TRAINING_ACTOR, "new_training", "training_start"));

    run.log_param("data_version", data_fingerprint(records)?);
    run.log_param("n_samples", records.len());
    run.log_param("n_features", FEATURE_NAMES.len());
    run.log_param("target", TARGET_COLUMN);

    let (train_rows, test_rows) = train_test_split(records, config.test_fraction, config.seed);
    ensure!(!train_rows.is_empty(), "no rows left to train on");
    run.log_param("train_size", train_rows.len());
    run.log_param("test_size", test_rows.len());

    let train_factors: Vec<RatingFactors> = train_rows.iter().map(ClaimRecord::factors).collect();
    let train_targets: Array1<f64> = train_rows.iter().map(|r| r.claim_amount).collect();

    info!("Training model on {} rows", train_rows.len());
    let pipeline = FeaturePipeline::fit(&train_factors);
    let features = pipeline.transform(&train_factors)?;
    let regressor = RidgeRegressor::fit(&features, &train_targets, config.alpha)
        .context("failed to fit regressor")?;
    run.log_param("model_type", "RidgeRegressor");
    run.log_param("alpha", config.alpha);
    run.log_param("random_state", config.seed);
    run.log_param("preprocessing_steps", "standardization,onehot");

    let artifact = ModelArtifact::new(pipeline, regressor)
        .with_param("alpha", config.alpha)
        .with_param("experiment", &config.experiment);

    info!("Evaluating model");
    let eval_rows = if test_rows.is_empty() { &train_rows } else { &test_rows };
    let eval_factors: Vec<RatingFactors> = eval_rows.iter().map(ClaimRecord::factors).collect();
    let eval_targets: Vec<f64> = eval_rows.iter().map(|r| r.claim_amount).collect();
    let metrics = evaluate_model(&artifact, &eval_factors, &eval_targets)?;
    for (key, value) in metrics.as_map() {
        run.log_metric(key, value);
    }

    info!("Logging model artifacts");
    registry.log_run(&run, &artifact)?;
    let mut version = registry.register(&config.model_name, &run.run_id)?;
    if let Some(stage) = config.stage {
        version = registry.transition(&config.model_name, version.version, stage)?;
    }

    audit.submit(AuditEntry::new(
        TRAINING_ACTOR,
        &format!("run_id_{}", run.run_id),
        "training_complete",
    ));
    info!("Model training completed. Run ID: {}", run.run_id);
    info!(
        "Model metrics: mse={:.2} rmse={:.2} mae={:.2} r2={:.4}",
        metrics.mse, metrics.rmse, metrics.mae, metrics.r2
    );

    Ok(TrainOutcome {
        run_id: run.run_id,
        version,
        metrics,
    })
}
