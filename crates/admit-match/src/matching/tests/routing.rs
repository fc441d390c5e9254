use super::common::*;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::matching::USER_ID_HEADER;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn post_json_as(uri: &str, user: &str, body: Value) -> Request<Body> {
    let mut request = post_json(uri, body);
    request
        .headers_mut()
        .insert(USER_ID_HEADER, user.parse().expect("header value"));
    request
}

#[tokio::test]
async fn start_route_issues_a_session_id() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(
            Request::post("/api/assessments/start")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let session = payload
        .get("anon_session_id")
        .and_then(Value::as_str)
        .expect("session id present");
    assert_eq!(session.len(), 36);
}

#[tokio::test]
async fn submit_route_returns_ranked_cards_and_echoes_the_session() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json(
            "/api/assessments/submit",
            json!({
                "anon_session_id": "sess-42",
                "features": { "gpa": "88/100", "ielts": "7.0" },
                "preferences": { "regions": ["UK"] },
                "filters": { "discipline": ["CS"] },
                "topk": "1"
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let results = payload
        .get("results")
        .and_then(Value::as_array)
        .expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("rank"), Some(&json!(1)));
    assert_eq!(results[0].get("featured"), Some(&json!(true)));
    assert!(results[0].pointer("/program/title").is_some());
    assert!(results[0].pointer("/explain/basis").is_some());

    assert_eq!(payload.pointer("/meta/total"), Some(&json!(2)));
    assert_eq!(payload.pointer("/meta/returned"), Some(&json!(1)));
    assert_eq!(payload.pointer("/meta/anon_session_id"), Some(&json!("sess-42")));
}

#[tokio::test]
async fn submit_route_reads_null_sections_as_empty() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json(
            "/api/assessments/submit",
            json!({ "features": null, "preferences": null, "filters": null, "topk": null }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.pointer("/meta/total"), Some(&json!(4)));
    assert_eq!(payload.pointer("/meta/system_recommend"), Some(&json!(true)));
    assert_eq!(payload.pointer("/meta/applied_filters"), Some(&json!({})));
}

#[tokio::test]
async fn submit_route_mixes_null_and_present_fields() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json(
            "/api/assessments/submit",
            json!({
                "features": { "gpa": 3.6 },
                "preferences": { "regions": null, "schools": ["UCL"], "system_recommend": null },
                "filters": { "country": null, "discipline": ["CS"], "degree_level": null }
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.pointer("/meta/total"), Some(&json!(2)));
    assert_eq!(payload.pointer("/meta/system_recommend"), Some(&json!(true)));
    assert_eq!(
        payload.pointer("/meta/applied_filters"),
        Some(&json!({ "discipline": ["CS"] }))
    );
}

#[tokio::test]
async fn predict_route_reads_null_sections_as_empty() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json(
            "/api/programs/1/predict",
            json!({ "features": null, "preferences": null }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn claim_route_reads_null_payloads_as_empty() {
    let (service, repository) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json_as(
            "/api/assessments/claim",
            "7",
            json!({ "anon_session_id": "sess-nulls", "input": null, "results": null }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("saved"), Some(&json!(true)));
    assert_eq!(repository.len(), 1);
}

#[tokio::test]
async fn submitted_results_can_be_claimed_as_posted() {
    let (service, repository) = build_service();
    let router = router_with_service(service);

    let submitted = router
        .clone()
        .oneshot(post_json(
            "/api/assessments/submit",
            json!({ "features": { "gpa": 3.8, "ielts": 7.5 } }),
        ))
        .await
        .expect("route executes");
    let submitted = read_json_body(submitted).await;
    let results = submitted.get("results").cloned().expect("results present");
    let top_id = submitted
        .pointer("/results/0/program/id")
        .and_then(Value::as_u64)
        .expect("top program id");

    let claim = json!({
        "anon_session_id": "sess-roundtrip",
        "input": { "features": { "gpa": 3.8 } },
        "results": results
    });
    let first = router
        .clone()
        .oneshot(post_json_as("/api/assessments/claim", "7", claim.clone()))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);
    let first = read_json_body(first).await;
    assert_eq!(first.get("saved"), Some(&json!(true)));
    assert_eq!(first.get("duplicate"), Some(&json!(false)));
    assert_eq!(
        first.pointer("/latest_summary/top/program_id"),
        Some(&json!(top_id))
    );

    let second = router
        .oneshot(post_json_as("/api/assessments/claim", "7", claim))
        .await
        .expect("route executes");
    let second = read_json_body(second).await;
    assert_eq!(second.get("duplicate"), Some(&json!(true)));
    assert_eq!(second.get("archived_row_id"), first.get("archived_row_id"));
    assert_eq!(repository.len(), 1);
}

#[tokio::test]
async fn claim_route_without_user_is_a_successful_no_op() {
    let (service, repository) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json(
            "/api/assessments/claim",
            json!({ "anon_session_id": "sess-1", "results": ranked_results() }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("saved"), Some(&json!(false)));
    assert_eq!(payload.get("archived_row_id"), Some(&Value::Null));
    assert_eq!(repository.len(), 0);
}

#[tokio::test]
async fn claim_route_rejects_missing_session() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json_as(
            "/api/assessments/claim",
            "7",
            json!({ "anon_session_id": "" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn claim_route_rejects_malformed_user_header() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(post_json_as(
            "/api/assessments/claim",
            "not-a-number",
            json!({ "anon_session_id": "sess-1" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claim_route_rejects_non_ascii_user_header() {
    let (service, repository) = build_service();
    let mut request = post_json(
        "/api/assessments/claim",
        json!({ "anon_session_id": "sess-1", "results": ranked_results() }),
    );
    request.headers_mut().insert(
        USER_ID_HEADER,
        HeaderValue::from_bytes(b"\xff7").expect("opaque header value"),
    );

    let response = router_with_service(service)
        .oneshot(request)
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(repository.len(), 0);
}

#[tokio::test]
async fn claim_route_maps_repository_outage_to_internal_error() {
    let service = service_with(catalog(), Arc::new(UnavailableRepository));
    let response = router_with_service(service)
        .oneshot(post_json_as(
            "/api/assessments/claim",
            "7",
            json!({ "anon_session_id": "sess-1" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn predict_route_scores_known_programs_and_rejects_unknown_ones() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let found = router
        .clone()
        .oneshot(post_json(
            "/api/programs/2/predict",
            json!({ "features": { "gpa": 3.2 } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(found.status(), StatusCode::OK);
    let payload = read_json_body(found).await;
    assert_eq!(payload.pointer("/program/id"), Some(&json!(2)));

    let missing = router
        .oneshot(post_json("/api/programs/999/predict", json!({})))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_stats_route_reports_totals() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(
            Request::get("/api/assessments/catalog-stats")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("program_total"), Some(&json!(4)));
    assert_eq!(payload.pointer("/by_country/UK"), Some(&json!(2)));
}

#[tokio::test]
async fn history_route_requires_a_user() {
    let (service, _) = build_service();
    let response = router_with_service(service)
        .oneshot(
            Request::get("/api/assessments/history")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn history_route_lists_claimed_sessions() {
    let (service, _) = build_service();
    service
        .claim(
            Some(crate::matching::UserId(7)),
            crate::matching::ClaimRequest {
                anon_session_id: Some("sess-1".to_string()),
                input: None,
                results: Some(ranked_results()),
            },
        )
        .expect("claim succeeds");

    let response = router_with_service(service)
        .oneshot(
            Request::get("/api/assessments/history?limit=5")
                .header(USER_ID_HEADER, "7")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .expect("items array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("prob"), Some(&json!(0.68)));
}
