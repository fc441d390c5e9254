use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::matching::archive::{
    extract_summary, AnonSessionId, ArchivedAssessment, AssessmentId, AssessmentRepository,
    NewAssessment, RepositoryError, UserId,
};
use crate::matching::catalog::{CatalogError, CatalogStats, InMemoryProgramCatalog, ProgramCatalog};
use crate::matching::domain::{MetricKind, Program, ProgramFilters, ProgramId, RequirementThreshold};
use crate::matching::scoring::HeuristicScorer;
use crate::matching::{matching_router, MatchingService};

pub(super) const TEST_SEED: u64 = 7;

fn requirement(metric: MetricKind, min_value: &str) -> RequirementThreshold {
    RequirementThreshold {
        metric,
        min_value: min_value.to_string(),
        note: None,
    }
}

fn program(
    id: u64,
    slug: &str,
    title: &str,
    university: &str,
    (country, city): (&str, &str),
    (discipline, degree_level): (&str, &str),
    requirements: Vec<RequirementThreshold>,
) -> Program {
    Program {
        id: ProgramId(id),
        slug: slug.to_string(),
        title: title.to_string(),
        university: university.to_string(),
        country: country.to_string(),
        city: city.to_string(),
        discipline: discipline.to_string(),
        degree_level: degree_level.to_string(),
        tuition: None,
        overview_brief: None,
        requirements,
    }
}

pub(super) fn programs() -> Vec<Program> {
    vec![
        program(
            1,
            "ucl-msc-cs",
            "MSc Computer Science",
            "UCL",
            ("UK", "London"),
            ("CS", "Master"),
            vec![
                requirement(MetricKind::Gpa, "3.3"),
                requirement(MetricKind::Ielts, "6.5"),
            ],
        ),
        program(
            2,
            "edinburgh-msc-ds",
            "MSc Data Science",
            "University of Edinburgh",
            ("UK", "Edinburgh"),
            ("CS", "Master"),
            vec![
                requirement(MetricKind::Gpa, "3.0"),
                requirement(MetricKind::Ielts, "6.5"),
            ],
        ),
        program(
            3,
            "tudelft-msc-civil",
            "MSc Civil Engineering",
            "TU Delft",
            ("Netherlands", "Delft"),
            ("Engineering", "Master"),
            vec![requirement(MetricKind::Gpa, "3.0")],
        ),
        program(
            4,
            "nus-phd-finance",
            "PhD Finance",
            "NUS",
            ("Singapore", "Singapore"),
            ("Finance", "PhD"),
            vec![
                requirement(MetricKind::Gpa, "3.5"),
                requirement(MetricKind::Gre, "320"),
            ],
        ),
    ]
}

pub(super) fn catalog() -> InMemoryProgramCatalog {
    InMemoryProgramCatalog::new(programs())
}

pub(super) fn features(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub(super) fn strong_applicant() -> Map<String, Value> {
    features(json!({ "gpa": "3.7/4.0", "ielts": 7.5, "gre": 325 }))
}

pub(super) fn ranked_results() -> Vec<Value> {
    vec![
        json!({
            "rank": 1,
            "featured": true,
            "prob": 0.68,
            "percent": 68,
            "program": { "id": 1, "title": "MSc Computer Science", "university": "UCL", "country": "UK", "city": "London" },
            "explain": { "low": 0.53, "high": 0.83, "risks": [], "improvements": [] }
        }),
        json!({
            "rank": 2,
            "featured": false,
            "prob": 0.61,
            "percent": 61,
            "program": { "id": 2, "title": "MSc Data Science", "university": "University of Edinburgh", "country": "UK", "city": "Edinburgh" }
        }),
    ]
}

pub(super) fn build_service() -> (
    MatchingService<InMemoryProgramCatalog, MemoryAssessmentRepository>,
    Arc<MemoryAssessmentRepository>,
) {
    let repository = Arc::new(MemoryAssessmentRepository::default());
    let service = service_with(catalog(), repository.clone());
    (service, repository)
}

pub(super) fn service_with<C, R>(catalog: C, repository: Arc<R>) -> MatchingService<C, R>
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    MatchingService::new(
        Arc::new(catalog),
        repository,
        Arc::new(HeuristicScorer::seeded(TEST_SEED)),
    )
}

pub(super) fn router_with_service<C, R>(service: MatchingService<C, R>) -> axum::Router
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    matching_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryAssessmentRepository {
    records: Arc<Mutex<HashMap<(UserId, AnonSessionId), ArchivedAssessment>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryAssessmentRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl AssessmentRepository for MemoryAssessmentRepository {
    fn find(
        &self,
        user_id: UserId,
        anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&(user_id, anon_session_id.clone())).cloned())
    }

    fn insert(&self, record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = (record.user_id, record.anon_session_id.clone());
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        let id = AssessmentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let archived = record.into_archived(id);
        guard.insert(key, archived.clone());
        Ok(archived)
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut rows: Vec<ArchivedAssessment> = guard
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            (right.created_at, right.id).cmp(&(left.created_at, left.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Loses the first insert race: a competing claim lands between the lookup and the insert.
#[derive(Default)]
pub(super) struct RacingRepository {
    pub(super) inner: MemoryAssessmentRepository,
    raced: AtomicBool,
}

impl RacingRepository {
    fn competing_record(record: &NewAssessment) -> NewAssessment {
        let results = vec![json!({ "prob": 0.42, "program": { "id": 3, "title": "MSc Civil Engineering" } })];
        NewAssessment {
            user_id: record.user_id,
            anon_session_id: record.anon_session_id.clone(),
            input_payload: json!({ "source": "other tab" }),
            summary: extract_summary(&results),
            results,
            created_at: Utc::now(),
        }
    }
}

impl AssessmentRepository for RacingRepository {
    fn find(
        &self,
        user_id: UserId,
        anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError> {
        self.inner.find(user_id, anon_session_id)
    }

    fn insert(&self, record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.insert(Self::competing_record(&record))?;
        }
        self.inner.insert(record)
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError> {
        self.inner.list_for_user(user_id, limit)
    }
}

/// Reports a conflict but never returns the conflicting row.
pub(super) struct ConflictRepository;

impl AssessmentRepository for ConflictRepository {
    fn find(
        &self,
        _user_id: UserId,
        _anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError> {
        Ok(None)
    }

    fn insert(&self, _record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn list_for_user(
        &self,
        _user_id: UserId,
        _limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableRepository;

impl AssessmentRepository for UnavailableRepository {
    fn find(
        &self,
        _user_id: UserId,
        _anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_for_user(
        &self,
        _user_id: UserId,
        _limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingCatalog;

impl ProgramCatalog for FailingCatalog {
    fn query(&self, _filters: &ProgramFilters, _limit: usize) -> Result<Vec<Program>, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }

    fn fetch(&self, _id: ProgramId) -> Result<Option<Program>, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }
}

/// Wraps the in-memory catalog and records every query it receives.
pub(super) struct RecordingCatalog {
    inner: InMemoryProgramCatalog,
    queries: Mutex<Vec<ProgramFilters>>,
}

impl RecordingCatalog {
    pub(super) fn new(inner: InMemoryProgramCatalog) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn queries(&self) -> Vec<ProgramFilters> {
        self.queries.lock().expect("catalog mutex poisoned").clone()
    }
}

impl ProgramCatalog for RecordingCatalog {
    fn query(&self, filters: &ProgramFilters, limit: usize) -> Result<Vec<Program>, CatalogError> {
        self.queries
            .lock()
            .expect("catalog mutex poisoned")
            .push(filters.clone());
        self.inner.query(filters, limit)
    }

    fn fetch(&self, id: ProgramId) -> Result<Option<Program>, CatalogError> {
        self.inner.fetch(id)
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        self.inner.stats()
    }
}

pub(super) fn filters(country: &[&str], discipline: &[&str], degree_level: &[&str]) -> ProgramFilters {
    let owned = |values: &[&str]| -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    };
    ProgramFilters {
        country: owned(country),
        discipline: owned(discipline),
        degree_level: owned(degree_level),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
