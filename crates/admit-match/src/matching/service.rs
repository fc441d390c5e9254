use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::archive::{
    extract_summary, AnonSessionId, ArchivedAssessment, AssessmentId, AssessmentRepository,
    LatestSummary, NewAssessment, RepositoryError, UserId,
};
use super::candidate::Candidate;
use super::catalog::{retrieve_with_relaxation, CatalogError, CatalogStats, ProgramCatalog};
use super::domain::{
    null_as_default, ApplicantFeatures, ApplicantProfile, FilterField, Preferences,
    ProgramFilters, ProgramId,
};
use super::ranker::{self, RankedResult, ScoredProgram, DEFAULT_TOP_K};
use super::scoring::Scorer;

/// Recommendation input as posted by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Preferences,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: ProgramFilters,
    #[serde(default, deserialize_with = "lenient_top_k")]
    pub topk: Option<usize>,
}

/// Single-program scoring input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramScoreRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub results: Vec<RankedResult>,
    pub meta: RecommendationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMeta {
    /// Programs scored, before the top-k cut.
    pub total: usize,
    pub returned: usize,
    pub system_recommend: bool,
    /// Filters actually used, after any relaxation.
    pub applied_filters: ProgramFilters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relaxed: Vec<FilterField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_session_id: Option<String>,
}

/// Archival request for a finished anonymous session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    #[serde(default)]
    pub anon_session_id: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub results: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub saved: bool,
    pub duplicate: bool,
    pub archived_row_id: Option<AssessmentId>,
    pub latest_summary: Option<LatestSummary>,
}

impl ClaimOutcome {
    fn not_saved() -> Self {
        Self {
            saved: false,
            duplicate: false,
            archived_row_id: None,
            latest_summary: None,
        }
    }

    fn archived(record: &ArchivedAssessment, duplicate: bool) -> Self {
        Self {
            saved: true,
            duplicate,
            archived_row_id: Some(record.id),
            latest_summary: Some(record.latest_summary()),
        }
    }
}

/// Service composing catalog retrieval, scoring, ranking, and the session archive.
pub struct MatchingService<C, R> {
    catalog: Arc<C>,
    repository: Arc<R>,
    scorer: Arc<dyn Scorer>,
}

impl<C, R> MatchingService<C, R>
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    pub fn new(catalog: Arc<C>, repository: Arc<R>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            catalog,
            repository,
            scorer,
        }
    }

    /// Scores the filtered catalog and returns the ranked top-k.
    ///
    /// Either every candidate is scored or an error is returned; there is no partial list.
    pub fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<Recommendation, MatchingServiceError> {
        let RecommendationRequest {
            features,
            preferences,
            filters,
            topk,
        } = request;

        let pool = retrieve_with_relaxation(self.catalog.as_ref(), &filters)?;
        let applicant = ApplicantProfile {
            features: ApplicantFeatures::from_json(&features),
            preferences,
        };

        let scored: Vec<ScoredProgram> = pool
            .programs
            .into_iter()
            .map(|program| {
                let candidate = Candidate::from_program(&program);
                let (score, explanation) = self.scorer.score(&candidate, &applicant);
                ScoredProgram {
                    program,
                    score,
                    explanation,
                }
            })
            .collect();

        let total = scored.len();
        let results = ranker::rank(scored, topk.unwrap_or(DEFAULT_TOP_K));
        debug!(
            backend = self.scorer.backend(),
            total,
            returned = results.len(),
            "recommendation ranked"
        );

        Ok(Recommendation {
            meta: RecommendationMeta {
                total,
                returned: results.len(),
                system_recommend: applicant.preferences.system_recommend,
                applied_filters: pool.applied_filters,
                relaxed: pool.relaxed,
                anon_session_id: None,
            },
            results,
        })
    }

    /// Scores one program by id, for detail pages.
    pub fn score_program(
        &self,
        program_id: ProgramId,
        request: ProgramScoreRequest,
    ) -> Result<RankedResult, MatchingServiceError> {
        let program = self
            .catalog
            .fetch(program_id)?
            .ok_or(MatchingServiceError::ProgramNotFound(program_id))?;

        let applicant = ApplicantProfile {
            features: ApplicantFeatures::from_json(&request.features),
            preferences: request.preferences,
        };
        let candidate = Candidate::from_program(&program);
        let (score, explanation) = self.scorer.score(&candidate, &applicant);

        let mut ranked = ranker::rank(
            vec![ScoredProgram {
                program,
                score,
                explanation,
            }],
            1,
        );
        ranked
            .pop()
            .ok_or(MatchingServiceError::ProgramNotFound(program_id))
    }

    /// Issues a fresh anonymous session id for a new evaluation.
    pub fn start_session(&self) -> AnonSessionId {
        AnonSessionId(Uuid::new_v4().to_string())
    }

    /// Attaches an anonymous session's results to a user, at most once per (user, session).
    ///
    /// Without a user nothing is stored and the call still succeeds.
    pub fn claim(
        &self,
        user_id: Option<UserId>,
        request: ClaimRequest,
    ) -> Result<ClaimOutcome, MatchingServiceError> {
        let anon_session_id = request
            .anon_session_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AnonSessionId(value.to_string()))
            .ok_or_else(|| {
                MatchingServiceError::Validation("anon_session_id is required".to_string())
            })?;

        let Some(user_id) = user_id else {
            debug!(%anon_session_id, "claim without user, not archived");
            return Ok(ClaimOutcome::not_saved());
        };

        if let Some(existing) = self.repository.find(user_id, &anon_session_id)? {
            info!(%user_id, %anon_session_id, id = existing.id.0, "assessment already archived");
            return Ok(ClaimOutcome::archived(&existing, true));
        }

        let results = request.results.unwrap_or_default();
        let input_payload = match request.input {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(input) => input,
        };
        let record = NewAssessment {
            user_id,
            anon_session_id: anon_session_id.clone(),
            input_payload,
            summary: extract_summary(&results),
            results,
            created_at: Utc::now(),
        };

        match self.repository.insert(record) {
            Ok(saved) => {
                info!(%user_id, %anon_session_id, id = saved.id.0, "assessment archived");
                Ok(ClaimOutcome::archived(&saved, false))
            }
            Err(RepositoryError::Conflict) => {
                let winner = self
                    .repository
                    .find(user_id, &anon_session_id)?
                    .ok_or_else(|| {
                        RepositoryError::Unavailable(
                            "archived assessment conflicted but could not be read back"
                                .to_string(),
                        )
                    })?;
                info!(%user_id, %anon_session_id, id = winner.id.0, "concurrent claim resolved to existing row");
                Ok(ClaimOutcome::archived(&winner, true))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Archived assessments for a user, newest first.
    pub fn history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<LatestSummary>, MatchingServiceError> {
        let rows = self.repository.list_for_user(user_id, limit)?;
        Ok(rows.iter().map(ArchivedAssessment::latest_summary).collect())
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats, MatchingServiceError> {
        Ok(self.catalog.stats()?)
    }
}

/// Error raised by the matching service.
#[derive(Debug, thiserror::Error)]
pub enum MatchingServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Accepts numbers and numeric strings; anything else falls back to the default.
fn lenient_top_k<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match raw {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed
        .filter(|value| value.is_finite())
        .map(|value| ranker::clamp_top_k(value.trunc().max(0.0) as usize)))
}
