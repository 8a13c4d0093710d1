use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::data::ClaimRecord;
use crate::factors::{Gender, Region};

const BASE_AMOUNT: f64 = 5000.0;
const PER_YEAR_OF_AGE: f64 = 100.0;
const BMI_THRESHOLD: f64 = 30.0;
const PER_BMI_POINT_OVER: f64 = 500.0;
const SMOKER_LOADING: f64 = 15000.0;
const PER_CHILD: f64 = 2000.0;

/// Generates `n_samples` synthetic claims. The same seed always yields the
/// same dataset.
pub fn generate(n_samples: usize, seed: u64) -> Result<Vec<ClaimRecord>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bmi_dist = Normal::<f64>::new(26.0, 4.0)?;
    let noise = Normal::<f64>::new(1.0, 0.1)?;

    let records = (0..n_samples)
        .map(|_| {
            let age: u32 = rng.gen_range(18..65);
            let gender = *Gender::ALL.choose(&mut rng).unwrap_or(&Gender::Female);
            let bmi = bmi_dist.sample(&mut rng).clamp(16.0, 45.0);
            let children: u32 = rng.gen_range(0..5);
            let smoker: bool = rng.gen_bool(0.5);
            let region = *Region::ALL.choose(&mut rng).unwrap_or(&Region::Northeast);

            let amount = expected_claim(age, bmi, children, smoker) * noise.sample(&mut rng);
            let claim_amount = (amount.max(0.0) * 100.0).round() / 100.0;

            ClaimRecord {
                age,
                gender,
                bmi,
                children,
                smoker,
                region,
                claim_amount,
            }
        })
        .collect();

    Ok(records)
}

/// Noise-free claim amount for the given factors.
pub fn expected_claim(age: u32, bmi: f64, children: u32, smoker: bool) -> f64 {
    let mut amount = BASE_AMOUNT + f64::from(age) * PER_YEAR_OF_AGE;
    if bmi > BMI_THRESHOLD {
        amount += (bmi - BMI_THRESHOLD) * PER_BMI_POINT_OVER;
    }
    if smoker {
        amount += SMOKER_LOADING;
    }
    amount + f64::from(children) * PER_CHILD
}
