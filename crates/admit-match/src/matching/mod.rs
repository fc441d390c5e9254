//! Program matching: candidate building, scoring, relaxation, ranking, and session archival.
//!
//! Data flows catalog → [`catalog::retrieve_with_relaxation`] → [`Candidate::from_program`] →
//! [`Scorer::score`] → [`ranker::rank`]. Archival of finished sessions goes through
//! [`MatchingService::claim`].

pub mod archive;
pub mod candidate;
pub mod catalog;
pub mod domain;
pub mod importer;
pub mod normalizer;
pub mod ranker;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use archive::{
    extract_summary, AnonSessionId, ArchivedAssessment, AssessmentId, AssessmentRepository,
    AssessmentSummary, LatestSummary, NewAssessment, RepositoryError, TopProgramSummary, UserId,
};
pub use candidate::Candidate;
pub use catalog::{
    retrieve_with_relaxation, CandidatePool, CatalogError, CatalogStats, InMemoryProgramCatalog,
    ProgramCatalog, CANDIDATE_POOL_LIMIT,
};
pub use domain::{
    ApplicantFeatures, ApplicantProfile, FilterField, MetricKind, Preferences, Program,
    ProgramFilters, ProgramId, RequirementThreshold,
};
pub use importer::{CatalogImportError, ProgramCsvImporter};
pub use normalizer::{normalize_gpa, normalize_gpa_value, normalize_gpa_with_scale};
pub use ranker::{rank, ProgramCard, RankedResult, ScoredProgram};
pub use router::{matching_router, SubmitRequest, USER_ID_HEADER};
pub use scoring::{
    build_scorer, resolve_backend, Explanation, HeuristicScorer, Scorer, ScorerBackend,
    ScoringConfig,
};
pub use service::{
    ClaimOutcome, ClaimRequest, MatchingService, MatchingServiceError, ProgramScoreRequest,
    Recommendation, RecommendationMeta, RecommendationRequest,
};
