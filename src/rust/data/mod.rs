pub mod generate;
pub mod summary;

pub use generate::generate;
pub use summary::{summarize, DatasetSummary, NumericSummary};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::factors::{Gender, RatingFactors, Region};

pub const DEFAULT_DATA_PATH: &str = "data/health_claims.csv";
pub const TARGET_COLUMN: &str = "claim_amount";

/// One row of the claims dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub age: u32,
    pub gender: Gender,
    pub bmi: f64,
    pub children: u32,
    #[serde(with = "yes_no")]
    pub smoker: bool,
    pub region: Region,
    pub claim_amount: f64,
}

impl ClaimRecord {
    pub fn factors(&self) -> RatingFactors {
        RatingFactors {
            age: self.age,
            bmi: self.bmi,
            children: self.children,
            smoker: self.smoker,
            region: self.region,
            gender: self.gender,
        }
    }
}

pub fn save_csv(records: &[ClaimRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

pub fn load_csv(path: &Path) -> Result<Vec<ClaimRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("data file not found at {}", path.display()))?;
    reader
        .deserialize::<ClaimRecord>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("error loading data: {} row {}", path.display(), i + 1))
        })
        .collect()
}

/// SHA-256 over the CSV rendering of `records`; identifies a dataset version.
pub fn data_fingerprint(records: &[ClaimRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to render dataset: {}", err))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

mod yes_no {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected yes or no, got '{}'",
                other
            ))),
        }
    }
}
