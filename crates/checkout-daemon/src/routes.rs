//! Axum router and all HTTP handlers for the checkout daemon.
//!
//! `build_router` is the single entry point; `main.rs` attaches middleware
//! (CORS, tracing) after calling it. Handlers are generic over the same
//! `PmsAdapter` / `PspAdapter` / `Store` boundary as the orchestrator so
//! tests can build the router against `checkout-testkit`'s fakes.

use std::future::Future;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use checkout_orchestrator::{webhook, expiry, InitializeInput};
use checkout_pms::PmsAdapter;
use checkout_psp::PspAdapter;
use checkout_schemas::CheckoutError;
use checkout_store::Store;
use serde::Serialize;
use uuid::Uuid;

use crate::api_types::{
    CancelCheckoutRequest, CheckoutResponse, ErrorResponse, FinalizeRequest, FinalizeResponse,
    HealthResponse, InitializeCheckoutRequest, PaymentIntentResponse, SweepResponse, UpdateGuestRequest,
};
use crate::error_map::error_response;
use crate::state::AppState;

pub fn build_router<P: PmsAdapter + 'static, S: PspAdapter + 'static, D: Store + 'static>(
    state: AppState<P, S, D>,
) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/checkouts", post(initialize_checkout::<P, S, D>))
        .route("/v1/checkouts/:id", get(get_checkout::<P, S, D>))
        .route("/v1/checkouts/:id/guest", patch(update_guest::<P, S, D>))
        .route("/v1/checkouts/:id/hold", post(create_hold::<P, S, D>))
        .route(
            "/v1/checkouts/:id/payment-intent",
            post(create_payment_intent::<P, S, D>),
        )
        .route("/v1/checkouts/:id/finalize", post(finalize::<P, S, D>))
        .route("/v1/checkouts/:id/cancel", post(cancel_checkout::<P, S, D>))
        .route("/v1/webhooks/psp", post(webhook_psp::<P, S, D>))
        .route("/jobs/expire-holds", post(jobs_expire_holds::<P, S, D>))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        service: "checkout-daemon",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn require_idempotency_key(headers: &HeaderMap, endpoint: &str) -> Result<String, CheckoutError> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CheckoutError::IdempotencyKeyRequired {
            endpoint: endpoint.to_string(),
        })
}

/// Wraps a side-effecting handler body with the idempotency-key replay
/// check: a cached response for `(endpoint, key)` short-circuits `f`
/// entirely so a retried request never re-runs PMS/PSP calls.
async fn with_idempotency<P, S, D, T, F, Fut>(
    state: &AppState<P, S, D>,
    headers: &HeaderMap,
    endpoint: &str,
    now: DateTime<Utc>,
    f: F,
) -> Response
where
    P: PmsAdapter,
    S: PspAdapter,
    D: Store,
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(StatusCode, T), CheckoutError>>,
{
    let key = match require_idempotency_key(headers, endpoint) {
        Ok(k) => k,
        Err(e) => return error_response(&e),
    };

    match state.orchestrator.store.idempotency_lookup(endpoint, &key, now).await {
        Ok(Some(cached)) => {
            let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
            return (status, Json(cached.body)).into_response();
        }
        Ok(None) => {}
        Err(e) => return error_response(&e),
    }

    match f().await {
        Ok((status, body)) => {
            if let Ok(json_body) = serde_json::to_value(&body) {
                state
                    .orchestrator
                    .store
                    .idempotency_capture(endpoint, &key, status.as_u16(), json_body, state.idempotency_ttl, now)
                    .await;
            }
            (status, Json(body)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn initialize_checkout<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    headers: HeaderMap,
    Json(req): Json<InitializeCheckoutRequest>,
) -> Response {
    let now = Utc::now();
    with_idempotency(&state, &headers, "POST /v1/checkouts", now, || async {
        let input = InitializeInput {
            listing_id: req.listing_id,
            check_in: req.check_in,
            check_out: req.check_out,
            guests: req.guests,
            coupon_code: req.coupon_code,
            metadata: req.metadata,
        };
        let checkout = state.orchestrator.initialize_checkout(input, now).await?;
        Ok((StatusCode::CREATED, CheckoutResponse { checkout }))
    })
    .await
}

async fn get_checkout<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.orchestrator.store.get_checkout(id).await {
        Ok(checkout) => (StatusCode::OK, Json(CheckoutResponse { checkout })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn update_guest<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGuestRequest>,
) -> Response {
    let now = Utc::now();
    match state.orchestrator.update_guest_info(id, req.guest, now).await {
        Ok(checkout) => (StatusCode::OK, Json(CheckoutResponse { checkout })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn create_hold<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let now = Utc::now();
    with_idempotency(&state, &headers, "POST /v1/checkouts/:id/hold", now, || async {
        let checkout = state.orchestrator.create_hold(id, now).await?;
        Ok((StatusCode::OK, CheckoutResponse { checkout }))
    })
    .await
}

async fn create_payment_intent<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let now = Utc::now();
    with_idempotency(
        &state,
        &headers,
        "POST /v1/checkouts/:id/payment-intent",
        now,
        || async {
            let (checkout, client_secret) = state.orchestrator.create_payment_intent(id, now).await?;
            Ok((StatusCode::OK, PaymentIntentResponse { checkout, client_secret }))
        },
    )
    .await
}

/// Collapses the "payment confirmed, webhook in flight" UX gap: polls the
/// store until the checkout reaches a terminal-for-this-purpose state or
/// the (hard-capped) deadline elapses, then reports success/pending rather
/// than leaving the client to interpret a bare checkout document.
async fn finalize<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    Path(id): Path<Uuid>,
    body: axum::body::Bytes,
) -> Response {
    // Body is optional per the route contract; an empty or absent body
    // just falls back to the default wait.
    let max_wait_ms = serde_json::from_slice::<FinalizeRequest>(&body)
        .ok()
        .and_then(|b| b.max_wait_ms)
        .unwrap_or(30_000);
    let max_wait = std::time::Duration::from_millis(max_wait_ms);

    match state.orchestrator.wait_for_confirmation(id, max_wait).await {
        Ok(checkout) => {
            let response = match checkout.state {
                checkout_schemas::CheckoutState::Booked => FinalizeResponse {
                    success: true,
                    booking_code: checkout.pms_booking_code.clone(),
                    pending: None,
                    checkout,
                },
                checkout_schemas::CheckoutState::Failed | checkout_schemas::CheckoutState::Expired => {
                    FinalizeResponse {
                        success: false,
                        booking_code: None,
                        pending: None,
                        checkout,
                    }
                }
                _ => FinalizeResponse {
                    success: false,
                    booking_code: None,
                    pending: Some(true),
                    checkout,
                },
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn cancel_checkout<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelCheckoutRequest>,
) -> Response {
    let now = Utc::now();
    match state.orchestrator.cancel_checkout(id, req.reason, now).await {
        Ok(checkout) => (StatusCode::OK, Json(CheckoutResponse { checkout })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn webhook_psp<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let signature = headers
        .get("X-PSP-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let now = Utc::now();
    match webhook::ingest_webhook(
        &state.orchestrator,
        &body,
        signature,
        &state.psp_webhook_secret,
        state.webhook_dedup_ttl,
        now,
    )
    .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn jobs_expire_holds<P: PmsAdapter, S: PspAdapter, D: Store>(
    State(state): State<AppState<P, S, D>>,
    headers: HeaderMap,
) -> Response {
    let expected = format!("Bearer {}", state.job_auth_token);
    let provided = headers.get("Authorization").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "missing or invalid job auth token".to_string(),
                code: "UNAUTHORIZED".to_string(),
            }),
        )
            .into_response();
    }

    let now = Utc::now();
    match expiry::sweep_expired_holds(&state.orchestrator, now).await {
        Ok(report) => (
            StatusCode::OK,
            Json(SweepResponse {
                expired_count: report.expired_count,
                error_count: report.error_count,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
