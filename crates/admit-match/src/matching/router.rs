use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::archive::{AssessmentRepository, UserId};
use super::catalog::ProgramCatalog;
use super::domain::ProgramId;
use super::service::{
    ClaimRequest, MatchingService, MatchingServiceError, ProgramScoreRequest,
    RecommendationRequest,
};

/// Identity header set by the upstream authentication layer.
pub const USER_ID_HEADER: &str = "x-user-id";
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Submit payload: a recommendation request plus the session id to echo back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub recommendation: RecommendationRequest,
    #[serde(default)]
    pub anon_session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// Router builder exposing the assessment endpoints.
pub fn matching_router<C, R>(service: Arc<MatchingService<C, R>>) -> Router
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    Router::new()
        .route("/api/assessments/start", post(start_handler::<C, R>))
        .route("/api/assessments/submit", post(submit_handler::<C, R>))
        .route("/api/assessments/claim", post(claim_handler::<C, R>))
        .route("/api/assessments/history", get(history_handler::<C, R>))
        .route(
            "/api/assessments/catalog-stats",
            get(catalog_stats_handler::<C, R>),
        )
        .route(
            "/api/programs/:program_id/predict",
            post(predict_handler::<C, R>),
        )
        .with_state(service)
}

pub(crate) async fn start_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    let anon_session_id = service.start_session();
    (
        StatusCode::OK,
        axum::Json(json!({ "anon_session_id": anon_session_id })),
    )
        .into_response()
}

pub(crate) async fn submit_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    let SubmitRequest {
        recommendation,
        anon_session_id,
    } = request;

    match service.recommend(recommendation) {
        Ok(mut recommendation) => {
            recommendation.meta.anon_session_id = anon_session_id;
            (StatusCode::OK, axum::Json(recommendation)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn claim_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ClaimRequest>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    let user_id = match user_from_headers(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match service.claim(user_id, request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn history_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    let user_id = match user_from_headers(&headers) {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            let payload = json!({ "error": "authentication required" });
            return (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response();
        }
        Err(response) => return response,
    };

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
    match service.history(user_id, limit) {
        Ok(items) => (StatusCode::OK, axum::Json(json!({ "items": items }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn catalog_stats_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    match service.catalog_stats() {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn predict_handler<C, R>(
    State(service): State<Arc<MatchingService<C, R>>>,
    Path(program_id): Path<u64>,
    axum::Json(request): axum::Json<ProgramScoreRequest>,
) -> Response
where
    C: ProgramCatalog + 'static,
    R: AssessmentRepository + 'static,
{
    match service.score_program(ProgramId(program_id), request) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

fn user_from_headers(headers: &HeaderMap) -> Result<Option<UserId>, Response> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let rejected = || {
        let payload = json!({ "error": "x-user-id must be a numeric user id" });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    };

    let value = raw.to_str().map_err(|_| rejected())?.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<u64>().map(|id| Some(UserId(id))).map_err(|_| rejected())
}

fn error_response(err: MatchingServiceError) -> Response {
    let status = match &err {
        MatchingServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MatchingServiceError::ProgramNotFound(_) => StatusCode::NOT_FOUND,
        MatchingServiceError::Catalog(_) | MatchingServiceError::Repository(_) => {
            error!(error = %err, "matching request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
