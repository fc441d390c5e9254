use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{MetricKind, Program, ProgramId, RequirementThreshold};
use super::normalizer::normalize_gpa;

/// Flat, scoring-ready projection of a catalog program.
///
/// Thresholds are `None` when the program states no usable requirement for the metric; the
/// scorer skips those metrics entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ProgramId,
    pub title: String,
    pub university: String,
    pub country: String,
    pub city: String,
    pub discipline: String,
    pub degree_level: String,
    pub tuition: Option<String>,
    pub gpa_min: Option<f64>,
    pub ielts_min: Option<f64>,
    pub gre_min: Option<f64>,
}

impl Candidate {
    pub fn from_program(program: &Program) -> Self {
        // Later rows for the same metric replace earlier ones.
        let by_metric: BTreeMap<&MetricKind, &RequirementThreshold> = program
            .requirements
            .iter()
            .map(|threshold| (&threshold.metric, threshold))
            .collect();

        let min_value = |metric: MetricKind| {
            by_metric
                .get(&metric)
                .map(|threshold| threshold.min_value.as_str())
        };

        Self {
            id: program.id,
            title: program.title.clone(),
            university: program.university.clone(),
            country: program.country.clone(),
            city: program.city.clone(),
            discipline: program.discipline.clone(),
            degree_level: program.degree_level.clone(),
            tuition: program.tuition.clone(),
            gpa_min: min_value(MetricKind::Gpa).and_then(normalize_gpa),
            ielts_min: min_value(MetricKind::Ielts).and_then(parse_threshold),
            gre_min: min_value(MetricKind::Gre).and_then(parse_threshold),
        }
    }

    pub fn has_requirements(&self) -> bool {
        self.gpa_min.is_some() || self.ielts_min.is_some() || self.gre_min.is_some()
    }
}

fn parse_threshold(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
