use serde::{Deserialize, Serialize};

use super::domain::{Program, ProgramId};
use super::scoring::Explanation;

pub const DEFAULT_TOP_K: usize = 10;
pub const MAX_TOP_K: usize = 50;

/// A program with its score, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProgram {
    pub program: Program,
    pub score: f64,
    pub explanation: Explanation,
}

/// Display fields of the ranked program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramCard {
    pub id: ProgramId,
    pub slug: String,
    pub title: String,
    pub university: String,
    pub city: String,
    pub country: String,
    pub degree_level: String,
    pub discipline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview_brief: Option<String>,
}

impl From<&Program> for ProgramCard {
    fn from(program: &Program) -> Self {
        Self {
            id: program.id,
            slug: program.slug.clone(),
            title: program.title.clone(),
            university: program.university.clone(),
            city: program.city.clone(),
            country: program.country.clone(),
            degree_level: program.degree_level.clone(),
            discipline: program.discipline.clone(),
            overview_brief: program.overview_brief.clone(),
        }
    }
}

/// One entry of the ranked output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub rank: usize,
    pub featured: bool,
    pub prob: f64,
    pub percent: u8,
    pub program: ProgramCard,
    pub explain: Explanation,
}

impl RankedResult {
    pub(crate) fn new(rank: usize, scored: ScoredProgram) -> Self {
        Self {
            rank,
            featured: rank == 1,
            prob: scored.score,
            percent: (scored.score * 100.0).round().clamp(0.0, 100.0) as u8,
            program: ProgramCard::from(&scored.program),
            explain: scored.explanation,
        }
    }
}

pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(1, MAX_TOP_K)
}

/// Orders by score descending and keeps the first `top_k`.
///
/// The sort is stable, so equal scores keep their catalog order.
pub fn rank(mut scored: Vec<ScoredProgram>, top_k: usize) -> Vec<RankedResult> {
    scored.sort_by(|left, right| right.score.total_cmp(&left.score));
    scored
        .into_iter()
        .take(clamp_top_k(top_k))
        .enumerate()
        .map(|(index, entry)| RankedResult::new(index + 1, entry))
        .collect()
}
