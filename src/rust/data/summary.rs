use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::data::ClaimRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: &'static str,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    fn of(column: &'static str, values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        // Sample standard deviation, matching a dataframe describe().
        let denom = values.len().saturating_sub(1).max(1) as f64;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / denom).sqrt();
        Self {
            column,
            mean,
            std,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

pub fn summarize(records: &[ClaimRecord]) -> DatasetSummary {
    DatasetSummary::of(records)
}

/// Descriptive statistics logged after generating or loading a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub samples: usize,
    pub numeric: Vec<NumericSummary>,
    pub categorical: BTreeMap<&'static str, BTreeMap<String, usize>>,
}

impl DatasetSummary {
    pub fn of(records: &[ClaimRecord]) -> Self {
        let column = |f: fn(&ClaimRecord) -> f64| records.iter().map(f).collect::<Vec<_>>();
        let numeric = vec![
            NumericSummary::of("age", &column(|r| f64::from(r.age))),
            NumericSummary::of("bmi", &column(|r| r.bmi)),
            NumericSummary::of("children", &column(|r| f64::from(r.children))),
            NumericSummary::of("claim_amount", &column(|r| r.claim_amount)),
        ];

        let mut categorical: BTreeMap<&'static str, BTreeMap<String, usize>> = BTreeMap::new();
        for record in records {
            let smoker = if record.smoker { "yes" } else { "no" };
            for (name, value) in [
                ("gender", record.gender.as_str()),
                ("smoker", smoker),
                ("region", record.region.as_str()),
            ] {
                *categorical
                    .entry(name)
                    .or_default()
                    .entry(value.to_string())
                    .or_default() += 1;
            }
        }

        Self {
            samples: records.len(),
            numeric,
            categorical,
        }
    }

    pub fn log(&self) {
        info!("Number of samples: {}", self.samples);
        for s in &self.numeric {
            info!(
                "{:>12}: mean={:.2} std={:.2} min={:.2} max={:.2}",
                s.column, s.mean, s.std, s.min, s.max
            );
        }
        for (column, counts) in &self.categorical {
            info!("{} distribution: {:?}", column, counts);
        }
    }
}
