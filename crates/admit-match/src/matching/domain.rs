use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::normalizer::{normalize_gpa, normalize_gpa_value, normalize_gpa_with_scale};

/// Identifier wrapper for catalog programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub u64);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog program as read from the catalog collaborator. Never mutated during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub slug: String,
    pub title: String,
    pub university: String,
    pub country: String,
    pub city: String,
    pub discipline: String,
    pub degree_level: String,
    #[serde(default)]
    pub tuition: Option<String>,
    #[serde(default)]
    pub overview_brief: Option<String>,
    #[serde(default)]
    pub requirements: Vec<RequirementThreshold>,
}

/// Minimum admission requirement attached to a program.
///
/// `min_value` stays free text because catalog data mixes `"3.0"`, `"85/100"`, and `"6.5"`;
/// it is parsed when the candidate is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementThreshold {
    #[serde(rename = "req_type")]
    pub metric: MetricKind,
    pub min_value: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Requirement metric vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    Gpa,
    Ielts,
    Toefl,
    Gre,
    Other(String),
}

impl MetricKind {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "GPA" => Self::Gpa,
            "IELTS" => Self::Ielts,
            "TOEFL" => Self::Toefl,
            "GRE" => Self::Gre,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MetricKind::Gpa => "GPA",
            MetricKind::Ielts => "IELTS",
            MetricKind::Toefl => "TOEFL",
            MetricKind::Gre => "GRE",
            MetricKind::Other(label) => label,
        }
    }
}

impl From<String> for MetricKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<MetricKind> for String {
    fn from(value: MetricKind) -> Self {
        value.label().to_string()
    }
}

/// Catalog filters. Empty lists are ignored; values within a field are OR-ed and fields are
/// AND-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramFilters {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub country: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub discipline: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub degree_level: Vec<String>,
}

impl ProgramFilters {
    pub fn is_unconstrained(&self) -> bool {
        self.country.is_empty() && self.discipline.is_empty() && self.degree_level.is_empty()
    }

    pub fn matches(&self, program: &Program) -> bool {
        field_matches(&self.country, &program.country)
            && field_matches(&self.discipline, &program.discipline)
            && field_matches(&self.degree_level, &program.degree_level)
    }

    /// Clears one field, returning whether anything was actually removed.
    pub(crate) fn clear(&mut self, field: FilterField) -> bool {
        let values = match field {
            FilterField::Country => &mut self.country,
            FilterField::Discipline => &mut self.discipline,
            FilterField::DegreeLevel => &mut self.degree_level,
        };
        let had_values = !values.is_empty();
        values.clear();
        had_values
    }
}

fn field_matches(accepted: &[String], value: &str) -> bool {
    accepted.is_empty() || accepted.iter().any(|candidate| candidate == value)
}

/// Filter dimensions, in the order they are given up when the pool comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Discipline,
    DegreeLevel,
    Country,
}

impl FilterField {
    pub const RELAXATION_ORDER: [FilterField; 3] = [
        FilterField::Discipline,
        FilterField::DegreeLevel,
        FilterField::Country,
    ];
}

/// Applicant stated preferences. Every list is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(
        default = "default_system_recommend",
        deserialize_with = "null_as_system_recommend"
    )]
    pub system_recommend: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub regions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schools: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub programs: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            system_recommend: true,
            regions: Vec::new(),
            schools: Vec::new(),
            programs: Vec::new(),
        }
    }
}

fn default_system_recommend() -> bool {
    true
}

fn null_as_system_recommend<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_system_recommend))
}

/// Reads an explicit `null` the same way as a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Applicant metrics after lenient coercion. GPA is always on the 4.0 scale.
///
/// `None` means the applicant did not supply the metric; malformed values become `Some(0.0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantFeatures {
    pub gpa: Option<f64>,
    pub ielts: Option<f64>,
    pub toefl: Option<f64>,
    pub gre: Option<f64>,
}

impl ApplicantFeatures {
    pub fn from_json(features: &Map<String, Value>) -> Self {
        let gpa = lenient_gpa(features.get("gpa"), features.get("gpa_scale"));

        let ielts = lenient_number(features.get("ielts")).or_else(|| {
            let test = features
                .get("english_test")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|test| !test.is_empty());
            match test {
                None => lenient_number(features.get("english_score")),
                Some(test) if test.eq_ignore_ascii_case("ielts") => {
                    lenient_number(features.get("english_score"))
                }
                Some(_) => None,
            }
        });

        Self {
            gpa,
            ielts,
            toefl: lenient_number(features.get("toefl")),
            gre: lenient_number(features.get("gre")),
        }
    }
}

/// Everything the scorer knows about one applicant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicantProfile {
    pub features: ApplicantFeatures,
    pub preferences: Preferences,
}

/// Coerces a loosely typed JSON field into a number.
///
/// Missing, null, and blank values are absent; anything else that does not parse is zero.
pub(crate) fn lenient_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => None,
        Value::Number(number) => Some(number.as_f64().unwrap_or(0.0)),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|parsed| parsed.is_finite())
                    .unwrap_or(0.0),
            )
        }
        _ => Some(0.0),
    }
}

fn lenient_gpa(raw: Option<&Value>, scale: Option<&Value>) -> Option<f64> {
    if let Some(Value::String(text)) = raw {
        if text.contains('/') {
            return Some(normalize_gpa(text).unwrap_or(0.0));
        }
    }

    let value = lenient_number(raw)?;
    match lenient_number(scale) {
        Some(scale) => Some(normalize_gpa_with_scale(value, scale)),
        None => Some(normalize_gpa_value(value)),
    }
}
