use chrono::NaiveDate;
use checkout_schemas::{Guests, Money, PriceBreakdown};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetail {
    pub listing_id: String,
    pub display_name: String,
    pub max_guests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedPrice {
    pub total: Money,
    pub currency: String,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub listing_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub listing_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: Guests,
    /// Caller-supplied idempotency key; the PMS must treat repeated calls
    /// with the same key as a no-op returning the original reservation.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub pms_reservation_id: String,
    pub status: ReservationStatus,
    pub booking_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Reserved,
    Booked,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReservationRequest {
    pub target_status: ReservationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPaymentRequest {
    pub pms_reservation_id: String,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    /// Used by the PMS as a dedup key so a retried webhook does not
    /// register the same payment twice.
    pub reference: String,
}
