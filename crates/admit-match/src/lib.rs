//! Program matching and assessment archival.
//!
//! [`matching`] holds the scoring pipeline (normalizer, candidate builder, scorer, relaxation,
//! ranker) and the session archive; [`config`], [`error`], and [`telemetry`] carry the ambient
//! service plumbing shared with the API binary.

pub mod config;
pub mod error;
pub mod matching;
pub mod telemetry;
