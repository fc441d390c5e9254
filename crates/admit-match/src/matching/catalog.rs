use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{FilterField, Program, ProgramFilters, ProgramId};

/// Upper bound on programs pulled into a single scoring pass.
pub const CANDIDATE_POOL_LIMIT: usize = 1000;

/// Read-only access to the program catalog.
pub trait ProgramCatalog: Send + Sync {
    /// Programs matching every non-empty filter field, at most `limit` of them.
    fn query(&self, filters: &ProgramFilters, limit: usize) -> Result<Vec<Program>, CatalogError>;
    fn fetch(&self, id: ProgramId) -> Result<Option<Program>, CatalogError>;
    fn stats(&self) -> Result<CatalogStats, CatalogError>;
}

/// Catalog backend failure.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Facet counts across the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub program_total: usize,
    pub by_country: BTreeMap<String, usize>,
    pub by_discipline: BTreeMap<String, usize>,
    pub by_degree_level: BTreeMap<String, usize>,
    pub requirement_types: BTreeMap<String, usize>,
}

impl CatalogStats {
    pub fn from_programs<'a>(programs: impl IntoIterator<Item = &'a Program>) -> Self {
        let mut stats = Self::default();
        for program in programs {
            stats.program_total += 1;
            *stats.by_country.entry(program.country.clone()).or_default() += 1;
            *stats
                .by_discipline
                .entry(program.discipline.clone())
                .or_default() += 1;
            *stats
                .by_degree_level
                .entry(program.degree_level.clone())
                .or_default() += 1;
            for threshold in &program.requirements {
                *stats
                    .requirement_types
                    .entry(threshold.metric.label().to_string())
                    .or_default() += 1;
            }
        }
        stats
    }
}

/// Candidate pool plus the filters that actually produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool {
    pub programs: Vec<Program>,
    pub applied_filters: ProgramFilters,
    /// Filter fields cleared to reach a non-empty pool, in the order they were cleared.
    pub relaxed: Vec<FilterField>,
}

impl CandidatePool {
    pub fn was_relaxed(&self) -> bool {
        !self.relaxed.is_empty()
    }
}

/// Queries the catalog, giving up discipline, then degree level, then country while the pool
/// stays empty.
///
/// Relaxation is cumulative and only re-queries when a step cleared a non-empty field. If every
/// step still yields nothing the empty pool is returned with the caller's original filters.
pub fn retrieve_with_relaxation<C>(
    catalog: &C,
    filters: &ProgramFilters,
) -> Result<CandidatePool, CatalogError>
where
    C: ProgramCatalog + ?Sized,
{
    let programs = catalog.query(filters, CANDIDATE_POOL_LIMIT)?;
    if !programs.is_empty() {
        debug!(pool = programs.len(), "candidate pool retrieved");
        return Ok(CandidatePool {
            programs,
            applied_filters: filters.clone(),
            relaxed: Vec::new(),
        });
    }

    let mut relaxed_filters = filters.clone();
    let mut relaxed = Vec::new();
    for field in FilterField::RELAXATION_ORDER {
        if !relaxed_filters.clear(field) {
            continue;
        }
        relaxed.push(field);

        let programs = catalog.query(&relaxed_filters, CANDIDATE_POOL_LIMIT)?;
        if !programs.is_empty() {
            warn!(
                relaxed = ?relaxed,
                pool = programs.len(),
                "filters over-constrained the catalog; relaxed"
            );
            return Ok(CandidatePool {
                programs,
                applied_filters: relaxed_filters,
                relaxed,
            });
        }
    }

    debug!("candidate pool empty after relaxation");
    Ok(CandidatePool {
        programs: Vec::new(),
        applied_filters: filters.clone(),
        relaxed: Vec::new(),
    })
}

/// Catalog held entirely in memory, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgramCatalog {
    programs: Vec<Program>,
}

impl InMemoryProgramCatalog {
    pub fn new(programs: Vec<Program>) -> Self {
        Self { programs }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }
}

impl ProgramCatalog for InMemoryProgramCatalog {
    fn query(&self, filters: &ProgramFilters, limit: usize) -> Result<Vec<Program>, CatalogError> {
        Ok(self
            .programs
            .iter()
            .filter(|program| filters.matches(program))
            .take(limit)
            .cloned()
            .collect())
    }

    fn fetch(&self, id: ProgramId) -> Result<Option<Program>, CatalogError> {
        Ok(self.programs.iter().find(|program| program.id == id).cloned())
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        Ok(CatalogStats::from_programs(&self.programs))
    }
}
