use super::super::candidate::Candidate;
use super::super::domain::{ApplicantFeatures, Preferences};

pub(crate) const PREFERENCE_WEIGHT: f64 = 0.25;
pub(crate) const PREFERENCE_CAP: f64 = 0.25;
pub(crate) const PREFERENCE_MATCH_BONUS: f64 = 0.1;
pub(crate) const NOISE_WEIGHT: f64 = 0.05;
pub(crate) const NOISE_AMPLITUDE: f64 = 0.02;
pub(crate) const NEUTRAL_SCORE: f64 = 0.5;

/// Metrics with a hard threshold on the candidate side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Metric {
    Gpa,
    Ielts,
    Gre,
}

impl Metric {
    pub(crate) const ALL: [Metric; 3] = [Metric::Gpa, Metric::Ielts, Metric::Gre];

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Metric::Gpa => "GPA",
            Metric::Ielts => "IELTS",
            Metric::Gre => "GRE",
        }
    }

    /// Gap, in metric units, that saturates the component at 0 or 1.
    pub(crate) const fn sensitivity(self) -> f64 {
        match self {
            Metric::Gpa => 1.0,
            Metric::Ielts => 2.0,
            Metric::Gre => 50.0,
        }
    }

    pub(crate) const fn weight(self) -> f64 {
        match self {
            Metric::Gpa => 0.5,
            Metric::Ielts => 0.3,
            Metric::Gre => 0.2,
        }
    }

    pub(crate) fn threshold(self, candidate: &Candidate) -> Option<f64> {
        match self {
            Metric::Gpa => candidate.gpa_min,
            Metric::Ielts => candidate.ielts_min,
            Metric::Gre => candidate.gre_min,
        }
    }

    pub(crate) fn applicant_value(self, features: &ApplicantFeatures) -> Option<f64> {
        match self {
            Metric::Gpa => features.gpa,
            Metric::Ielts => features.ielts,
            Metric::Gre => features.gre,
        }
    }
}

/// Running weighted mean.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WeightedSum {
    sum: f64,
    weight: f64,
}

impl WeightedSum {
    pub(crate) fn add(&mut self, component: f64, weight: f64) {
        self.sum += component * weight;
        self.weight += weight;
    }

    pub(crate) fn resolve(self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            NEUTRAL_SCORE
        }
    }
}

/// Maps the applicant's distance from a threshold into `[0, 1]`, with 0.5 meaning "exactly at
/// the minimum".
pub(crate) fn gap_component(applicant: f64, threshold: f64, sensitivity: f64) -> f64 {
    ((applicant - threshold) / sensitivity).clamp(-1.0, 1.0) * 0.5 + 0.5
}

pub(crate) fn preference_bonus(candidate: &Candidate, preferences: &Preferences) -> f64 {
    let region = format!("{}|{}", candidate.country, candidate.city).to_lowercase();
    let university = candidate.university.to_lowercase();
    let title = candidate.title.to_lowercase();

    let mut bonus = 0.0;
    if any_contained(&preferences.regions, &region) {
        bonus += PREFERENCE_MATCH_BONUS;
    }
    if any_contained(&preferences.schools, &university) {
        bonus += PREFERENCE_MATCH_BONUS;
    }
    if any_contained(&preferences.programs, &title) {
        bonus += PREFERENCE_MATCH_BONUS;
    }

    f64::min(bonus, PREFERENCE_CAP)
}

/// Case-insensitive substring match. Blank needles never match.
fn any_contained(needles: &[String], haystack: &str) -> bool {
    needles
        .iter()
        .map(|needle| needle.trim().to_lowercase())
        .any(|needle| !needle.is_empty() && haystack.contains(&needle))
}
