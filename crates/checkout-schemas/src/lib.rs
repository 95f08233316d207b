pub mod checkout;
pub mod error;
pub mod hashing;
pub mod idempotency;
pub mod money;

pub use checkout::{
    Checkout, CheckoutMetadata, GuestInfo, Guests, LockedQuote, PriceBreakdown, RefundFlag,
    StateHistoryEntry,
};
pub use checkout_state_machine::{Actor, CheckoutState};
pub use error::{ApiErrorKind, CheckoutError};
pub use idempotency::{IdempotencyRecord, WebhookEventRecord};
pub use money::Money;

pub const CURRENCY: &str = "USD";
