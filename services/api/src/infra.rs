use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use admit_match::config::CatalogConfig;
use admit_match::error::AppError;
use admit_match::matching::{
    AnonSessionId, ArchivedAssessment, AssessmentId, AssessmentRepository, InMemoryProgramCatalog,
    NewAssessment, ProgramCsvImporter, RepositoryError, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::demo::demo_catalog;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

type SessionKey = (UserId, AnonSessionId);

/// Process-local archive. The map lock makes lookup-then-insert atomic for a single key.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentRepository {
    rows: Arc<Mutex<HashMap<SessionKey, ArchivedAssessment>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryAssessmentRepository {
    fn rows(&self) -> Result<MutexGuard<'_, HashMap<SessionKey, ArchivedAssessment>>, RepositoryError> {
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("assessment store lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or_default()
    }
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    fn find(
        &self,
        user_id: UserId,
        anon_session_id: &AnonSessionId,
    ) -> Result<Option<ArchivedAssessment>, RepositoryError> {
        let rows = self.rows()?;
        Ok(rows.get(&(user_id, anon_session_id.clone())).cloned())
    }

    fn insert(&self, record: NewAssessment) -> Result<ArchivedAssessment, RepositoryError> {
        let mut rows = self.rows()?;
        let key = (record.user_id, record.anon_session_id.clone());
        if rows.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        let id = AssessmentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let archived = record.into_archived(id);
        rows.insert(key, archived.clone());
        Ok(archived)
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<ArchivedAssessment>, RepositoryError> {
        let rows = self.rows()?;
        let mut owned: Vec<ArchivedAssessment> = rows
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|left, right| (right.created_at, right.id).cmp(&(left.created_at, left.id)));
        owned.truncate(limit);
        Ok(owned)
    }
}

/// Loads the configured CSV catalog, or the bundled demo catalog when none is configured.
pub(crate) fn load_catalog(config: &CatalogConfig) -> Result<InMemoryProgramCatalog, AppError> {
    match &config.csv_path {
        Some(path) => {
            let catalog = ProgramCsvImporter::from_path(path)?;
            info!(path = %path.display(), programs = catalog.len(), "program catalog loaded");
            Ok(catalog)
        }
        None => {
            let catalog = demo_catalog();
            info!(programs = catalog.len(), "no CATALOG_CSV configured, using demo catalog");
            Ok(catalog)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admit_match::matching::AssessmentSummary;
    use chrono::Utc;
    use serde_json::json;
    use std::path::PathBuf;

    fn record(user: u64, session: &str) -> NewAssessment {
        NewAssessment {
            user_id: UserId(user),
            anon_session_id: AnonSessionId(session.to_string()),
            input_payload: json!({}),
            results: Vec::new(),
            summary: AssessmentSummary::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_a_second_row_for_the_same_session() {
        let repository = InMemoryAssessmentRepository::default();
        let first = repository.insert(record(1, "sess")).expect("insert succeeds");
        assert_eq!(first.id, AssessmentId(1));

        let second = repository.insert(record(1, "sess"));
        assert!(matches!(second, Err(RepositoryError::Conflict)));

        let other_user = repository.insert(record(2, "sess")).expect("insert succeeds");
        assert_eq!(other_user.id, AssessmentId(2));
        assert_eq!(repository.len(), 2);
    }

    #[test]
    fn lists_newest_rows_first() {
        let repository = InMemoryAssessmentRepository::default();
        for session in ["a", "b", "c"] {
            repository.insert(record(5, session)).expect("insert succeeds");
        }

        let rows = repository.list_for_user(UserId(5), 2).expect("list succeeds");
        let sessions: Vec<&str> = rows.iter().map(|row| row.anon_session_id.0.as_str()).collect();
        assert_eq!(sessions, vec!["c", "b"]);
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let config = CatalogConfig {
            csv_path: Some(PathBuf::from("/nonexistent/programs.csv")),
        };
        assert!(matches!(load_catalog(&config), Err(AppError::CatalogImport(_))));
    }

    #[test]
    fn falls_back_to_the_demo_catalog() {
        let catalog = load_catalog(&CatalogConfig::default()).expect("demo catalog loads");
        assert!(!catalog.is_empty());
    }
}
