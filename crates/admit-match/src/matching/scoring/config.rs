use serde::{Deserialize, Serialize};

/// Scoring backend selection and reproducibility controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub backend: ScorerBackend,
    /// Fixed noise seed. `None` draws from OS entropy, so repeated calls are not reproducible.
    pub seed: Option<u64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::Heuristic,
            seed: None,
        }
    }
}

/// Known scoring implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerBackend {
    Heuristic,
}

impl ScorerBackend {
    /// Resolves a configured backend name. Unknown names return `None` so the caller can log
    /// and fall back.
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "heuristic" | "pseudo" => Some(Self::Heuristic),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ScorerBackend::Heuristic => "heuristic",
        }
    }
}
