//! Shared error taxonomy for the checkout core.
//!
//! Every crate downstream of this one (store, adapters, orchestrator,
//! daemon) returns `CheckoutError` at its public boundary so the HTTP layer
//! can map a single enum to status codes instead of re-deriving the mapping
//! per crate.

use std::fmt;

/// Coarse category used by the HTTP layer to pick a status code. Kept
/// separate from `CheckoutError` itself so logging can group on category
/// without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Validation,
    NotFound,
    InvalidState,
    InvalidStateForUpdate,
    GuestRequired,
    IdempotencyKeyRequired,
    IdempotencyConflict,
    PmsClientError,
    PmsServerError,
    PmsTimeout,
    PspSignature,
    PspError,
    UnsupportedCurrency,
    QuoteExpired,
    QuoteTampered,
    Internal,
}

#[derive(Debug, Clone)]
pub enum CheckoutError {
    Validation(String),
    NotFound(String),
    InvalidState { from: String, attempted: String },
    InvalidStateForUpdate { from: String },
    GuestRequired,
    IdempotencyKeyRequired { endpoint: String },
    IdempotencyConflict { endpoint: String, key: String },
    PmsClientError { status: u16, message: String },
    PmsServerError { status: u16, message: String },
    PmsTimeout { operation: String },
    PspSignatureInvalid,
    PspError(String),
    UnsupportedCurrency { expected: String, got: String },
    QuoteExpired,
    QuoteTampered,
    Internal(String),
}

impl CheckoutError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            CheckoutError::Validation(_) => ApiErrorKind::Validation,
            CheckoutError::NotFound(_) => ApiErrorKind::NotFound,
            CheckoutError::InvalidState { .. } => ApiErrorKind::InvalidState,
            CheckoutError::InvalidStateForUpdate { .. } => ApiErrorKind::InvalidStateForUpdate,
            CheckoutError::GuestRequired => ApiErrorKind::GuestRequired,
            CheckoutError::IdempotencyKeyRequired { .. } => ApiErrorKind::IdempotencyKeyRequired,
            CheckoutError::IdempotencyConflict { .. } => ApiErrorKind::IdempotencyConflict,
            CheckoutError::PmsClientError { .. } => ApiErrorKind::PmsClientError,
            CheckoutError::PmsServerError { .. } => ApiErrorKind::PmsServerError,
            CheckoutError::PmsTimeout { .. } => ApiErrorKind::PmsTimeout,
            CheckoutError::PspSignatureInvalid => ApiErrorKind::PspSignature,
            CheckoutError::PspError(_) => ApiErrorKind::PspError,
            CheckoutError::UnsupportedCurrency { .. } => ApiErrorKind::UnsupportedCurrency,
            CheckoutError::QuoteExpired => ApiErrorKind::QuoteExpired,
            CheckoutError::QuoteTampered => ApiErrorKind::QuoteTampered,
            CheckoutError::Internal(_) => ApiErrorKind::Internal,
        }
    }
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutError::Validation(m) => write!(f, "VALIDATION: {m}"),
            CheckoutError::NotFound(m) => write!(f, "NOT_FOUND: {m}"),
            CheckoutError::InvalidState { from, attempted } => {
                write!(f, "INVALID_STATE: cannot apply {attempted} from {from}")
            }
            CheckoutError::InvalidStateForUpdate { from } => {
                write!(f, "INVALID_STATE_FOR_UPDATE: guest cannot be updated from {from}")
            }
            CheckoutError::GuestRequired => write!(f, "GUEST_REQUIRED: guest info with a valid email is required"),
            CheckoutError::IdempotencyKeyRequired { endpoint } => {
                write!(f, "IDEMPOTENCY_KEY_REQUIRED: {endpoint} requires Idempotency-Key")
            }
            CheckoutError::IdempotencyConflict { endpoint, key } => {
                write!(f, "IDEMPOTENCY_CONFLICT: {endpoint} key {key} already used with a different request body")
            }
            CheckoutError::PmsClientError { status, message } => {
                write!(f, "PMS_CLIENT_ERROR({status}): {message}")
            }
            CheckoutError::PmsServerError { status, message } => {
                write!(f, "PMS_SERVER_ERROR({status}): {message}")
            }
            CheckoutError::PmsTimeout { operation } => {
                write!(f, "PMS_TIMEOUT: {operation}")
            }
            CheckoutError::PspSignatureInvalid => write!(f, "PSP_SIGNATURE: invalid webhook signature"),
            CheckoutError::PspError(m) => write!(f, "PSP_ERROR: {m}"),
            CheckoutError::UnsupportedCurrency { expected, got } => {
                write!(f, "UNSUPPORTED_CURRENCY: expected {expected}, got {got}")
            }
            CheckoutError::QuoteExpired => write!(f, "QUOTE_EXPIRED"),
            CheckoutError::QuoteTampered => write!(f, "QUOTE_TAMPERED"),
            CheckoutError::Internal(m) => write!(f, "INTERNAL: {m}"),
        }
    }
}

impl std::error::Error for CheckoutError {}
