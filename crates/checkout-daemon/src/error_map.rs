//! Maps `CheckoutError` onto an HTTP status code and JSON error body. One
//! place for this mapping so handlers never hand-pick a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use checkout_schemas::{ApiErrorKind, CheckoutError};

use crate::api_types::ErrorResponse;

fn code_for(kind: ApiErrorKind) -> &'static str {
    match kind {
        ApiErrorKind::Validation => "VALIDATION",
        ApiErrorKind::NotFound => "NOT_FOUND",
        ApiErrorKind::InvalidState => "INVALID_STATE",
        ApiErrorKind::InvalidStateForUpdate => "INVALID_STATE_FOR_UPDATE",
        ApiErrorKind::GuestRequired => "GUEST_REQUIRED",
        ApiErrorKind::IdempotencyKeyRequired => "IDEMPOTENCY_KEY_REQUIRED",
        ApiErrorKind::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
        ApiErrorKind::PmsClientError => "PMS_CLIENT_ERROR",
        ApiErrorKind::PmsServerError => "PMS_SERVER_ERROR",
        ApiErrorKind::PmsTimeout => "PMS_TIMEOUT",
        ApiErrorKind::PspSignature => "PSP_SIGNATURE_INVALID",
        ApiErrorKind::PspError => "PSP_ERROR",
        ApiErrorKind::UnsupportedCurrency => "UNSUPPORTED_CURRENCY",
        ApiErrorKind::QuoteExpired => "QUOTE_EXPIRED",
        ApiErrorKind::QuoteTampered => "QUOTE_TAMPERED",
        ApiErrorKind::Internal => "INTERNAL",
    }
}

/// Status for errors whose code doesn't carry an upstream status of its own.
/// `PmsClientError` is handled separately in `error_response` since it must
/// pass through the real upstream 4xx rather than picking one here.
fn status_for(kind: ApiErrorKind) -> StatusCode {
    match kind {
        ApiErrorKind::Validation
        | ApiErrorKind::GuestRequired
        | ApiErrorKind::UnsupportedCurrency
        | ApiErrorKind::QuoteTampered
        | ApiErrorKind::IdempotencyKeyRequired
        | ApiErrorKind::PspSignature => StatusCode::BAD_REQUEST,
        ApiErrorKind::NotFound => StatusCode::NOT_FOUND,
        ApiErrorKind::InvalidState
        | ApiErrorKind::InvalidStateForUpdate
        | ApiErrorKind::IdempotencyConflict
        | ApiErrorKind::QuoteExpired => StatusCode::CONFLICT,
        ApiErrorKind::PmsClientError => StatusCode::BAD_GATEWAY,
        ApiErrorKind::PmsServerError | ApiErrorKind::PspError => StatusCode::BAD_GATEWAY,
        ApiErrorKind::PmsTimeout => StatusCode::GATEWAY_TIMEOUT,
        ApiErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(e: &CheckoutError) -> Response {
    let kind = e.kind();
    // A PMS 4xx passes through the real upstream status rather than a fixed
    // gateway code; every other kind maps to a fixed status.
    let status = if let CheckoutError::PmsClientError { status, .. } = e {
        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
    } else {
        status_for(kind)
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::info!(error = %e, "request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: code_for(kind).to_string(),
        }),
    )
        .into_response()
}
