//! Request and response types for the checkout daemon's HTTP endpoints.
//! No business logic lives here.

use checkout_schemas::{Checkout, CheckoutMetadata, Guests, GuestInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// SCREAMING_SNAKE_CASE error code, one per `ApiErrorKind` variant.
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeCheckoutRequest {
    pub listing_id: String,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub guests: Guests,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub checkout: Checkout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGuestRequest {
    pub guest: GuestInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentResponse {
    pub checkout: Checkout,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CancelCheckoutRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

/// Shape spelled out verbatim: `{success, bookingCode?, pending?, checkout}`.
/// `pending` carries the same checkout so a client can poll without a
/// second round trip when the deadline elapses before confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    pub checkout: Checkout,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub expired_count: u32,
    pub error_count: u32,
}
