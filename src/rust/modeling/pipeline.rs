//! Feature pipeline: standard scaling for numeric factors and one-hot
//! encoding (first category dropped) for categorical ones.

use anyhow::{anyhow, ensure, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::factors::{Gender, RatingFactors, Region};

const NUMERIC_WIDTH: usize = 3;

/// Output column order of [`FeaturePipeline::transform`].
pub const FEATURE_NAMES: [&str; 8] = [
    "age",
    "bmi",
    "children",
    "smoker_yes",
    "region_northwest",
    "region_southeast",
    "region_southwest",
    "gender_male",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Learns per-column mean and population standard deviation.
    /// Constant columns get a scale of 1.
    pub fn fit(columns: &Array2<f64>) -> Self {
        let n = columns.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(columns.ncols());
        let mut scales = Vec::with_capacity(columns.ncols());
        for column in columns.axis_iter(Axis(1)) {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }
        Self { means, scales }
    }

    /// `None` when the scaler was not fitted on column `index`.
    pub fn scale(&self, index: usize, value: f64) -> Option<f64> {
        let mean = self.means.get(index)?;
        let scale = self.scales.get(index)?;
        Some((value - mean) / scale)
    }

    fn check_shape(&self, width: usize) -> Result<()> {
        ensure!(
            self.means.len() == width && self.scales.len() == width,
            "scaler fitted on {} means and {} scales, expected {}",
            self.means.len(),
            self.scales.len(),
            width
        );
        ensure!(
            self.means.iter().all(|m| m.is_finite()),
            "scaler means must be finite"
        );
        ensure!(
            self.scales.iter().all(|s| s.is_finite() && *s > 0.0),
            "scaler scales must be finite and positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    scaler: StandardScaler,
}

impl FeaturePipeline {
    pub fn fit(rows: &[RatingFactors]) -> Self {
        let mut numeric = Array2::<f64>::zeros((rows.len(), NUMERIC_WIDTH));
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in numeric_features(row).into_iter().enumerate() {
                numeric[[i, j]] = value;
            }
        }
        Self {
            scaler: StandardScaler::fit(&numeric),
        }
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn width(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Fails if the scaler does not cover exactly the numeric columns.
    pub fn check_shape(&self) -> Result<()> {
        self.scaler.check_shape(NUMERIC_WIDTH)
    }

    pub fn transform(&self, rows: &[RatingFactors]) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((rows.len(), self.width()));
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in numeric_features(row).into_iter().enumerate() {
                out[[i, j]] = self
                    .scaler
                    .scale(j, value)
                    .ok_or_else(|| anyhow!("scaler has no column {} ({})", j, FEATURE_NAMES[j]))?;
            }
            for (j, value) in categorical_features(row).into_iter().enumerate() {
                out[[i, NUMERIC_WIDTH + j]] = value;
            }
        }
        Ok(out)
    }
}

fn numeric_features(row: &RatingFactors) -> [f64; NUMERIC_WIDTH] {
    [f64::from(row.age), row.bmi, f64::from(row.children)]
}

fn categorical_features(row: &RatingFactors) -> [f64; 5] {
    let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };
    [
        indicator(row.smoker),
        indicator(row.region == Region::Northwest),
        indicator(row.region == Region::Southeast),
        indicator(row.region == Region::Southwest),
        indicator(row.gender == Gender::Male),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(age: u32, bmi: f64, smoker: bool, region: Region, gender: Gender) -> RatingFactors {
        RatingFactors {
            age,
            bmi,
            children: 1,
            smoker,
            region,
            gender,
        }
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let rows = vec![
            row(20, 20.0, false, Region::Northeast, Gender::Female),
            row(40, 30.0, true, Region::Southwest, Gender::Male),
        ];
        let pipeline = FeaturePipeline::fit(&rows);
        assert_eq!(pipeline.scaler().means, vec![30.0, 25.0, 1.0]);
        assert_eq!(pipeline.scaler().scales, vec![10.0, 5.0, 1.0]);

        assert!(pipeline.check_shape().is_ok());
        let x = pipeline.transform(&rows).unwrap();
        assert_eq!(x.shape(), &[2, 8]);
        assert_eq!(x[[0, 0]], -1.0);
        assert_eq!(x[[1, 0]], 1.0);
        assert_eq!(x[[0, 1]], -1.0);
        // Constant column: centered, unit scale.
        assert_eq!(x[[0, 2]], 0.0);
    }

    #[test]
    fn test_one_hot_drops_first_category() {
        let rows = vec![row(30, 25.0, false, Region::Northeast, Gender::Female)];
        let pipeline = FeaturePipeline::fit(&rows);
        let x = pipeline.transform(&rows).unwrap();
        // Reference categories encode to all zeros.
        for j in 3..8 {
            assert_eq!(x[[0, j]], 0.0, "column {}", FEATURE_NAMES[j]);
        }

        let other = vec![row(30, 25.0, true, Region::Southeast, Gender::Male)];
        let x = pipeline.transform(&other).unwrap();
        assert_eq!(&x.row(0).to_vec()[3..], &[1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pipeline_survives_serde() {
        let rows = vec![
            row(25, 22.0, false, Region::Northwest, Gender::Female),
            row(55, 31.0, true, Region::Southeast, Gender::Male),
        ];
        let pipeline = FeaturePipeline::fit(&rows);
        let json = serde_json::to_string(&pipeline).unwrap();
        let restored: FeaturePipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.transform(&rows).unwrap(),
            pipeline.transform(&rows).unwrap()
        );
    }

    #[test]
    fn test_short_scaler_is_rejected_not_indexed() {
        let rows = vec![row(30, 25.0, false, Region::Northeast, Gender::Female)];
        let mut pipeline = FeaturePipeline::fit(&rows);
        pipeline.scaler.means = vec![35.0];

        assert_eq!(pipeline.scaler().scale(1, 25.0), None);
        assert!(pipeline.check_shape().is_err());
        let err = pipeline.transform(&rows).unwrap_err();
        assert!(err.to_string().contains("bmi"), "{}", err);
    }

    #[test]
    fn test_non_positive_scale_fails_shape_check() {
        let rows = vec![row(30, 25.0, false, Region::Northeast, Gender::Female)];
        let mut pipeline = FeaturePipeline::fit(&rows);
        pipeline.scaler.scales[2] = 0.0;
        assert!(pipeline.check_shape().is_err());
    }
}
