mod config;
mod explain;
mod rules;

pub use config::{ScorerBackend, ScoringConfig};
pub use explain::Explanation;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::candidate::Candidate;
use super::domain::ApplicantProfile;
use super::normalizer::round_to;
use rules::{Metric, WeightedSum, NOISE_AMPLITUDE, NOISE_WEIGHT, PREFERENCE_WEIGHT};

/// Scoring seam. Implementations turn one candidate and one applicant into a probability in
/// `[0, 1]` plus an explanation whose band brackets that probability.
pub trait Scorer: Send + Sync {
    fn score(&self, candidate: &Candidate, applicant: &ApplicantProfile) -> (f64, Explanation);

    /// Short backend name surfaced in logs.
    fn backend(&self) -> &'static str;
}

/// Weighted gap heuristic with bounded tie-breaking noise.
pub struct HeuristicScorer {
    rng: Mutex<StdRng>,
}

impl HeuristicScorer {
    /// Reproducible scorer: the same seed yields the same noise sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn noise(&self) -> f64 {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE)
    }
}

impl Scorer for HeuristicScorer {
    fn score(&self, candidate: &Candidate, applicant: &ApplicantProfile) -> (f64, Explanation) {
        let features = &applicant.features;
        let mut total = WeightedSum::default();

        for metric in Metric::ALL {
            if let (Some(threshold), Some(value)) =
                (metric.threshold(candidate), metric.applicant_value(features))
            {
                total.add(
                    rules::gap_component(value, threshold, metric.sensitivity()),
                    metric.weight(),
                );
            }
        }

        total.add(
            rules::preference_bonus(candidate, &applicant.preferences),
            PREFERENCE_WEIGHT,
        );
        total.add(self.noise() + 0.5, NOISE_WEIGHT);

        let score = round_to(total.resolve().clamp(0.0, 1.0), 3);
        let explanation = explain::explain(candidate, features, score);
        (score, explanation)
    }

    fn backend(&self) -> &'static str {
        ScorerBackend::Heuristic.label()
    }
}

/// Builds the configured scorer. There is no process-wide instance; callers own the result and
/// hand it to the service.
pub fn build_scorer(config: &ScoringConfig) -> Arc<dyn Scorer> {
    match config.backend {
        ScorerBackend::Heuristic => match config.seed {
            Some(seed) => Arc::new(HeuristicScorer::seeded(seed)),
            None => Arc::new(HeuristicScorer::from_entropy()),
        },
    }
}

/// Resolves a backend name from configuration, falling back to the heuristic.
pub fn resolve_backend(name: &str) -> ScorerBackend {
    ScorerBackend::from_name(name).unwrap_or_else(|| {
        warn!(backend = name, "unknown scoring backend, using heuristic");
        ScorerBackend::Heuristic
    })
}
