use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rating region. Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Northeast,
        Region::Northwest,
        Region::Southeast,
        Region::Southwest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Northeast => "northeast",
            Region::Northwest => "northwest",
            Region::Southeast => "southeast",
            Region::Southwest => "southwest",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Region::ALL
            .into_iter()
            .find(|region| region.as_str() == lowered)
            .ok_or_else(|| format!("unknown region '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Gender::ALL
            .into_iter()
            .find(|gender| gender.as_str() == lowered)
            .ok_or_else(|| format!("unknown gender '{}'", s))
    }
}

/// One subject's rating factors after validation and normalization.
///
/// This is the row shape every model in the crate consumes, both at
/// training time and when serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingFactors {
    pub age: u32,
    pub bmi: f64,
    pub children: u32,
    pub smoker: bool,
    pub region: Region,
    pub gender: Gender,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse_is_case_insensitive() {
        assert_eq!("SouthWest".parse::<Region>().unwrap(), Region::Southwest);
        assert_eq!(" northeast ".parse::<Region>().unwrap(), Region::Northeast);
        assert!("atlantis".parse::<Region>().is_err());
    }

    #[test]
    fn test_gender_parse_is_case_insensitive() {
        assert_eq!("FEMALE".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Region::Southeast).unwrap();
        assert_eq!(json, "\"southeast\"");
        let gender: Gender = serde_json::from_str("\"male\"").unwrap();
        assert_eq!(gender, Gender::Male);
    }
}
