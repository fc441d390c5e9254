//! Archival of anonymous evaluation sessions against authenticated users.

mod repository;
mod summary;

pub use repository::{
    AnonSessionId, ArchivedAssessment, AssessmentId, AssessmentRepository, LatestSummary,
    NewAssessment, RepositoryError, UserId,
};
pub use summary::{extract_summary, AssessmentSummary, TopProgramSummary, MAX_SUMMARY_ITEMS};
