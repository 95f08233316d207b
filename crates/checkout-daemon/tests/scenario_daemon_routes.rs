//! In-process scenario tests for checkout-daemon HTTP endpoints.
//!
//! Spins up the Axum router without binding a TCP socket and drives it via
//! `tower::ServiceExt::oneshot` against `checkout-testkit`'s fakes, the same
//! no-network style used for the orchestrator's own scenario tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use checkout_daemon::routes;
use checkout_daemon::state::AppState;
use checkout_orchestrator::Orchestrator;
use checkout_testkit::{FakePms, FakePsp, FakeStore};

type TestState = AppState<FakePms, FakePsp, FakeStore>;

fn make_state() -> TestState {
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(FakePms::new()),
        Arc::new(FakePsp::new()),
        Arc::new(FakeStore::new()),
        Duration::from_secs(900),
        Duration::from_secs(1800),
    ));

    AppState {
        orchestrator,
        idempotency_ttl: Duration::from_secs(3600),
        webhook_dedup_ttl: Duration::from_secs(7 * 86400),
        psp_webhook_secret: Arc::new("whsec_test".to_string()),
        job_auth_token: Arc::new("job-token-test".to_string()),
    }
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body collect failed").to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, json)
}

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = routes::build_router(make_state());
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "checkout-daemon");
}

#[tokio::test]
async fn hold_without_idempotency_key_is_rejected() {
    let router = routes::build_router(make_state());
    let req = Request::builder()
        .method("POST")
        .uri("/v1/checkouts/00000000-0000-0000-0000-000000000000/hold")
        .body(Body::empty())
        .unwrap();

    let (status, json) = call(router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "IDEMPOTENCY_KEY_REQUIRED");
}

#[tokio::test]
async fn jobs_expire_holds_requires_service_auth() {
    let router = routes::build_router(make_state());
    let req = Request::builder()
        .method("POST")
        .uri("/jobs/expire-holds")
        .body(Body::empty())
        .unwrap();

    let (status, _) = call(router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn jobs_expire_holds_runs_with_valid_service_auth() {
    let router = routes::build_router(make_state());
    let req = Request::builder()
        .method("POST")
        .uri("/jobs/expire-holds")
        .header("Authorization", "Bearer job-token-test")
        .body(Body::empty())
        .unwrap();

    let (status, json) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["expired_count"].as_u64().unwrap_or(0), 0);
}

#[tokio::test]
async fn initialize_then_get_round_trips_through_the_router() {
    let state = make_state();
    let router = routes::build_router(state);

    let body = serde_json::json!({
        "listing_id": "listing-1",
        "check_in": "2026-08-01",
        "check_out": "2026-08-04",
        "guests": { "adults": 2, "children": 0, "infants": 0 }
    });
    let req = Request::builder()
        .method("POST")
        .uri("/v1/checkouts")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let (status, json) = call(router.clone(), req).await;
    assert_eq!(status, StatusCode::CREATED);
    let checkout_id = json["checkout"]["checkout_id"].as_str().unwrap().to_string();
    assert_eq!(json["checkout"]["state"], "INITIATED");

    let get_req = Request::builder()
        .method("GET")
        .uri(format!("/v1/checkouts/{checkout_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, json) = call(router, get_req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["checkout"]["checkout_id"], checkout_id);
}

#[tokio::test]
async fn get_unknown_checkout_is_404() {
    let router = routes::build_router(make_state());
    let req = Request::builder()
        .method("GET")
        .uri("/v1/checkouts/11111111-1111-1111-1111-111111111111")
        .body(Body::empty())
        .unwrap();

    let (status, json) = call(router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
