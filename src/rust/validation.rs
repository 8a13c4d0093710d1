use std::fmt;
use std::ops::RangeInclusive;

use prometheus::IntCounter;
use serde::Serialize;
use tracing::warn;

use crate::factors::{Gender, RatingFactors, Region};
use crate::models::PredictionInput;

pub const AGE_RANGE: RangeInclusive<i64> = 0..=100;
pub const BMI_RANGE: RangeInclusive<f64> = 10.0..=50.0;
pub const CHILDREN_RANGE: RangeInclusive<i64> = 0..=10;

/// A single field constraint that a request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub constraint: String,
}

impl Violation {
    pub fn new(field: &'static str, constraint: impl Into<String>) -> Self {
        Self {
            field,
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.constraint)
    }
}

pub fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks prediction requests against the domain constraints.
///
/// Validation is all-or-nothing: every violated field is reported, and any
/// violation rejects the whole request. Each rejection bumps the shared
/// validation-error counter.
#[derive(Clone)]
pub struct InputValidator {
    rejections: IntCounter,
}

impl InputValidator {
    pub fn new(rejections: IntCounter) -> Self {
        Self { rejections }
    }

    pub fn validate(&self, input: &PredictionInput) -> Result<RatingFactors, Vec<Violation>> {
        let result = check_input(input);
        if let Err(violations) = &result {
            self.rejections.inc();
            warn!("Validation error: {}", describe_violations(violations));
        }
        result
    }

    /// Records a payload that never parsed into the request shape.
    pub fn reject_malformed(&self, reason: &str) {
        self.rejections.inc();
        warn!("Malformed prediction request: {}", reason);
    }
}

fn check_input(input: &PredictionInput) -> Result<RatingFactors, Vec<Violation>> {
    let mut violations = Vec::new();

    if !AGE_RANGE.contains(&input.age) {
        violations.push(age_violation());
    }
    if !BMI_RANGE.contains(&input.bmi) {
        violations.push(bmi_violation());
    }
    if !CHILDREN_RANGE.contains(&input.children) {
        violations.push(children_violation());
    }

    let region = input.region.parse::<Region>().map_err(|_| {
        Violation::new(
            "region",
            format!("must be one of {}", join_names(Region::ALL.map(|r| r.as_str()))),
        )
    });
    let gender = input.gender.parse::<Gender>().map_err(|_| {
        Violation::new(
            "gender",
            format!("must be one of {}", join_names(Gender::ALL.map(|g| g.as_str()))),
        )
    });

    match (region, gender) {
        (Ok(region), Ok(gender)) if violations.is_empty() => Ok(RatingFactors {
            // Ranges were checked above, so the narrowing casts are lossless.
            age: input.age as u32,
            bmi: input.bmi,
            children: input.children as u32,
            smoker: input.smoker,
            region,
            gender,
        }),
        (region, gender) => {
            violations.extend(region.err());
            violations.extend(gender.err());
            Err(violations)
        }
    }
}

impl RatingFactors {
    /// Re-checks numeric ranges on an already-typed row.
    pub fn check_ranges(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        if !AGE_RANGE.contains(&i64::from(self.age)) {
            violations.push(age_violation());
        }
        if !BMI_RANGE.contains(&self.bmi) {
            violations.push(bmi_violation());
        }
        if !CHILDREN_RANGE.contains(&i64::from(self.children)) {
            violations.push(children_violation());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn age_violation() -> Violation {
    Violation::new(
        "age",
        format!("must be between {} and {}", AGE_RANGE.start(), AGE_RANGE.end()),
    )
}

fn bmi_violation() -> Violation {
    Violation::new(
        "bmi",
        format!("must be between {} and {}", BMI_RANGE.start(), BMI_RANGE.end()),
    )
}

fn children_violation() -> Violation {
    Violation::new(
        "children",
        format!(
            "must be between {} and {}",
            CHILDREN_RANGE.start(),
            CHILDREN_RANGE.end()
        ),
    )
}

fn join_names<const N: usize>(names: [&str; N]) -> String {
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> (InputValidator, IntCounter) {
        let counter = IntCounter::new("test_validation_errors", "test").unwrap();
        (InputValidator::new(counter.clone()), counter)
    }

    fn valid_input() -> PredictionInput {
        PredictionInput {
            age: 35,
            bmi: 25.5,
            children: 2,
            smoker: false,
            region: "southwest".to_string(),
            gender: "female".to_string(),
        }
    }

    #[test]
    fn test_valid_input_normalizes_case() {
        let (validator, counter) = validator();
        let mut input = valid_input();
        input.region = "SouthWest".to_string();
        input.gender = "FEMALE".to_string();

        let factors = validator.validate(&input).unwrap();
        assert_eq!(factors.region, Region::Southwest);
        assert_eq!(factors.gender, Gender::Female);
        assert_eq!(factors.region.as_str(), "southwest");
        assert_eq!(factors.age, 35);
        assert_eq!(factors.children, 2);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        let (validator, _) = validator();
        for (age, bmi, children) in [(0, 10.0, 0), (100, 50.0, 10)] {
            let input = PredictionInput {
                age,
                bmi,
                children,
                ..valid_input()
            };
            assert!(validator.validate(&input).is_ok(), "{:?}", input);
        }
    }

    #[test]
    fn test_each_out_of_range_field_is_rejected() {
        let cases: Vec<(&str, PredictionInput)> = vec![
            ("age", PredictionInput { age: 150, ..valid_input() }),
            ("age", PredictionInput { age: -1, ..valid_input() }),
            ("bmi", PredictionInput { bmi: 5.0, ..valid_input() }),
            ("children", PredictionInput { children: 11, ..valid_input() }),
            (
                "region",
                PredictionInput {
                    region: "atlantis".to_string(),
                    ..valid_input()
                },
            ),
            (
                "gender",
                PredictionInput {
                    gender: "x".to_string(),
                    ..valid_input()
                },
            ),
        ];

        for (field, input) in cases {
            let (validator, counter) = validator();
            let violations = validator.validate(&input).unwrap_err();
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, field);
            assert_eq!(counter.get(), 1);
        }
    }

    #[test]
    fn test_all_violations_are_reported() {
        let (validator, counter) = validator();
        let input = PredictionInput {
            age: 150,
            bmi: 60.0,
            children: 2,
            smoker: true,
            region: "atlantis".to_string(),
            gender: "female".to_string(),
        };

        let violations = validator.validate(&input).unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["age", "bmi", "region"]);
        // One rejected request, one increment.
        assert_eq!(counter.get(), 1);

        let message = describe_violations(&violations);
        assert!(message.contains("age must be between 0 and 100"));
        assert!(message.contains("region must be one of northeast, northwest, southeast, southwest"));
    }

    #[test]
    fn test_malformed_payload_counts_as_rejection() {
        let (validator, counter) = validator();
        validator.reject_malformed("missing field `age`");
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_check_ranges_on_typed_row() {
        let (validator, _) = validator();
        let mut factors = validator.validate(&valid_input()).unwrap();
        assert!(factors.check_ranges().is_ok());

        factors.age = 120;
        factors.bmi = f64::NAN;
        let violations = factors.check_ranges().unwrap_err();
        assert_eq!(violations.len(), 2);
    }
}
