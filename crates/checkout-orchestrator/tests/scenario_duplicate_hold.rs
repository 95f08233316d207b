//! Scenario: Duplicate createHold Under Retry
//!
//! # Invariant under test
//!
//! A retried `createHold` call for a checkout that already reached
//! `HOLD_CREATED` is a no-op that returns the original reservation rather
//! than calling the PMS again — the fast path in `create_hold` short
//! circuits before any PMS call, and even if it didn't, the PMS call is
//! keyed by the checkout id so a second PMS call would return the same
//! reservation anyway.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{InitializeInput, Orchestrator};
use checkout_schemas::{CheckoutMetadata, Guests, GuestInfo};
use checkout_testkit::{FakePms, FakePsp, FakeStore};
use chrono::{NaiveDate, Utc};

#[tokio::test]
async fn retried_hold_returns_the_same_reservation() {
    let orch = Orchestrator::new(
        Arc::new(FakePms::new()),
        Arc::new(FakePsp::new()),
        Arc::new(FakeStore::new()),
        Duration::from_secs(900),
        Duration::from_secs(1800),
    );
    let now = Utc::now();

    let checkout = orch
        .initialize_checkout(
            InitializeInput {
                listing_id: "listing-1".to_string(),
                check_in: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 8, 4).unwrap(),
                guests: Guests {
                    adults: 1,
                    children: 0,
                    infants: 0,
                },
                coupon_code: None,
                metadata: CheckoutMetadata::default(),
            },
            now,
        )
        .await
        .unwrap();

    orch.update_guest_info(
        checkout.checkout_id,
        GuestInfo {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone: None,
            document: None,
        },
        now,
    )
    .await
    .unwrap();

    let first = orch.create_hold(checkout.checkout_id, now).await.unwrap();
    let second = orch.create_hold(checkout.checkout_id, now).await.unwrap();

    assert_eq!(first.pms_reservation_id, second.pms_reservation_id);
    assert_eq!(first.state, second.state);
    assert_eq!(second.state_history.len(), first.state_history.len());
}
