use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::summary::{AssessmentSummary, TopProgramSummary};

/// Authenticated user identity, resolved upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an anonymous evaluation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonSessionId(pub String);

impl fmt::Display for AnonSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentId(pub u64);

/// Row to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub user_id: UserId,
    pub anon_session_id: AnonSessionId,
    pub input_payload: Value,
    pub results: Vec<Value>,
    pub summary: AssessmentSummary,
    pub created_at: DateTime<Utc>,
}

impl NewAssessment {
    pub fn into_archived(self, id: AssessmentId) -> ArchivedAssessment {
        ArchivedAssessment {
            id,
            user_id: self.user_id,
            anon_session_id: self.anon_session_id,
            input_payload: self.input_payload,
            results: self.results,
            summary: self.summary,
            created_at: self.created_at,
        }
    }
}

/// Archived evaluation. Written once per (user, session) pair and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedAssessment {
    pub id: AssessmentId,
    pub user_id: UserId,
    pub anon_session_id: AnonSessionId,
    pub input_payload: Value,
    pub results: Vec<Value>,
    pub summary: AssessmentSummary,
    pub created_at: DateTime<Utc>,
}

impl ArchivedAssessment {
    pub fn latest_summary(&self) -> LatestSummary {
        LatestSummary {
            id: self.id,
            prob: self.summary.prob,
            low: self.summary.low,
            high: self.summary.high,
            risks: self.summary.risks.clone(),
            improvements: self.summary.improvements.clone(),
            top: self.summary.top.clone(),
            created_at: self.created_at,
        }
    }
}

/// Denormalized read view of an archived row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSummary {
    pub id: AssessmentId,
    pub prob: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub risks: Vec<String>,
    pub improvements: Vec<String>,
    pub top: TopProgramSummary,
    pub created_at: DateTime<Utc>,
}

/// Storage for archived assessments.
///
/// `insert` must be atomic and reject a second row for the same (user, session) pair with
/// [`RepositoryError::Conflict`], even when two inserts race.
pub trait AssessmentRepository: Send + Sync {
    fn find(
        &self,
        user_id: UserId,
        anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError>;
    fn insert(&self, record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError>;
    /// Most recent rows first.
    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("assessment already archived for this session")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
