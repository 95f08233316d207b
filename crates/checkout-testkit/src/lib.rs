//! Fakes for the checkout core's three external boundaries (store, PMS,
//! PSP), used by `checkout-orchestrator`'s integration tests so they don't
//! need a live Postgres instance or a sandboxed PMS/PSP account.

pub mod fake_pms;
pub mod fake_psp;
pub mod fake_store;

pub use fake_pms::FakePms;
pub use fake_psp::{sign_webhook_payload, FakePsp};
pub use fake_store::FakeStore;
