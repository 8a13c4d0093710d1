use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::factors::RatingFactors;
use crate::modeling::Regressor;

/// Regression quality on a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl EvaluationMetrics {
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("mse".to_string(), self.mse),
            ("rmse".to_string(), self.rmse),
            ("mae".to_string(), self.mae),
            ("r2".to_string(), self.r2),
        ])
    }
}

pub fn evaluate(predictions: &[f64], targets: &[f64]) -> EvaluationMetrics {
    let n = targets.len().max(1) as f64;
    let mean = targets.iter().sum::<f64>() / n;

    let (sq, abs) = predictions
        .iter()
        .zip(targets)
        .fold((0.0_f64, 0.0_f64), |(sq, abs), (p, t)| {
            (sq + (t - p).powi(2), abs + (t - p).abs())
        });
    let total: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();

    let mse = sq / n;
    EvaluationMetrics {
        mse,
        rmse: mse.sqrt(),
        mae: abs / n,
        // A constant target has no variance to explain.
        r2: if total > 0.0 { 1.0 - sq / total } else { 0.0 },
    }
}

/// Runs `model` over `rows` and scores the output against `targets`.
pub fn evaluate_model(
    model: &dyn Regressor,
    rows: &[RatingFactors],
    targets: &[f64],
) -> Result<EvaluationMetrics> {
    ensure!(
        rows.len() == targets.len(),
        "{} rows but {} targets",
        rows.len(),
        targets.len()
    );
    let predictions = model.predict(rows)?;
    ensure!(
        predictions.len() == targets.len(),
        "model returned {} predictions for {} rows",
        predictions.len(),
        rows.len()
    );
    Ok(evaluate(&predictions, targets))
}
