use serde::{Deserialize, Serialize};

use super::super::candidate::Candidate;
use super::super::domain::ApplicantFeatures;
use super::super::normalizer::round_to;
use super::rules::Metric;

/// Half-width of the reported band. Fixed, not estimated from any variance.
pub(crate) const BAND_HALF_WIDTH: f64 = 0.15;
pub(crate) const MAX_EXPLANATION_ITEMS: usize = 4;
pub(crate) const HEURISTIC_BASIS: &str = "Heuristic estimate: gap to minimum requirements, \
preference match, and light tie-breaking noise combined into a weighted score";

/// Human-readable explanation attached to every score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub low: f64,
    pub high: f64,
    pub risks: Vec<String>,
    pub improvements: Vec<String>,
    pub basis: String,
}

impl Explanation {
    pub fn brackets(&self, score: f64) -> bool {
        self.low <= score && score <= self.high
    }
}

pub(crate) fn explain(candidate: &Candidate, features: &ApplicantFeatures, score: f64) -> Explanation {
    let mut risks = Vec::new();
    let mut improvements = Vec::new();

    for metric in Metric::ALL {
        let (Some(threshold), Some(value)) =
            (metric.threshold(candidate), metric.applicant_value(features))
        else {
            continue;
        };
        if value >= threshold {
            continue;
        }
        if let Some(risk) = shortfall_risk(metric, threshold, value) {
            risks.push(risk);
            improvements.push(improvement_for(metric).to_string());
        }
    }

    Explanation {
        low: round_to(f64::max(0.0, score - BAND_HALF_WIDTH), 3),
        high: round_to(f64::min(1.0, score + BAND_HALF_WIDTH), 3),
        risks: dedup_capped(risks),
        improvements: dedup_capped(improvements),
        basis: HEURISTIC_BASIS.to_string(),
    }
}

fn shortfall_risk(metric: Metric, threshold: f64, value: f64) -> Option<String> {
    let gap = match metric {
        Metric::Gpa => round_to(threshold - value, 2).to_string(),
        Metric::Ielts => round_to(threshold - value, 1).to_string(),
        Metric::Gre => {
            let points = (threshold - value).trunc();
            if points <= 0.0 {
                return None;
            }
            format!("{} points", points as i64)
        }
    };
    Some(format!(
        "{} is {gap} below the minimum requirement (requires ≥ {threshold})",
        metric.label()
    ))
}

fn improvement_for(metric: Metric) -> &'static str {
    match metric {
        Metric::Gpa => "Raise the average in core courses to clear the hard GPA requirement",
        Metric::Ielts => {
            "Schedule timed practice tests and consider an intensive IELTS preparation course"
        }
        Metric::Gre => {
            "Target the weakest GRE section (Quant, Verbal, or Writing) with module-specific practice"
        }
    }
}

fn dedup_capped(items: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique.truncate(MAX_EXPLANATION_ITEMS);
    unique
}
