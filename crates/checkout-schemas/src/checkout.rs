use chrono::{DateTime, Utc};
use checkout_state_machine::{Actor, CheckoutState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guests {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub cleaning_fee: Money,
    pub service_fee: Money,
    pub taxes: Money,
}

/// Immutable once attached to a checkout (I2). `hash` binds the quote to the
/// exact booking inputs it was computed from so a later mutation of those
/// inputs can be detected before an irreversible PMS/PSP call is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedQuote {
    pub total: Money,
    pub currency: String,
    pub breakdown: PriceBreakdown,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub from: CheckoutState,
    pub to: CheckoutState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    pub actor: Actor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
}

/// True when a refund has been flagged because a payment-succeeded event
/// arrived after the checkout had already moved to EXPIRED. See the
/// resolution of the refund-on-late-webhook open question recorded in
/// DESIGN.md.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundFlag {
    pub required: bool,
    pub reason: Option<String>,
    pub flagged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub checkout_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: CheckoutState,
    pub state_history: Vec<StateHistoryEntry>,

    pub listing_id: String,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub guests: Guests,
    pub coupon_code: Option<String>,

    pub quote: LockedQuote,
    pub guest: Option<GuestInfo>,

    pub pms_reservation_id: Option<String>,
    pub pms_booking_code: Option<String>,
    pub psp_payment_intent_id: Option<String>,
    pub hold_expires_at: Option<DateTime<Utc>>,

    pub retry_count: u32,
    pub metadata: CheckoutMetadata,
    pub refund_flag: RefundFlag,
}

impl Checkout {
    /// Canonical join hashed into `quote.hash`: `listingId|checkIn|checkOut|adults|children|infants|couponCode`.
    pub fn canonical_quote_input(
        listing_id: &str,
        check_in: chrono::NaiveDate,
        check_out: chrono::NaiveDate,
        guests: &Guests,
        coupon_code: Option<&str>,
    ) -> String {
        format!(
            "{listing_id}|{check_in}|{check_out}|{}|{}|{}|{}",
            guests.adults,
            guests.children,
            guests.infants,
            coupon_code.unwrap_or("")
        )
    }

    /// Recomputes the quote hash from this checkout's own immutable booking
    /// inputs and compares it against the stored `quote.hash`. Used to
    /// detect tampering before any irreversible PMS/PSP call (resolution of
    /// the quote re-validation open question; see DESIGN.md).
    pub fn quote_hash_is_valid(&self) -> bool {
        let input = Self::canonical_quote_input(
            &self.listing_id,
            self.check_in,
            self.check_out,
            &self.guests,
            self.coupon_code.as_deref(),
        );
        crate::hashing::sha256_hex(input.as_bytes()) == self.quote.hash
    }
}
