//! Scenario: Happy Path — initiate, hold, pay, book.
//!
//! # Invariant under test
//!
//! The full `INITIATED -> HOLD_CREATED -> PAYMENT_CREATED -> PAID -> BOOKED`
//! path succeeds end to end when every external call succeeds, and the
//! final checkout carries the PMS booking code.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{InitializeInput, Orchestrator};
use checkout_schemas::{CheckoutMetadata, CheckoutState, Guests, GuestInfo};
use checkout_testkit::{FakePms, FakePsp, FakeStore};
use chrono::{NaiveDate, Utc};

fn orchestrator() -> Orchestrator<FakePms, FakePsp, FakeStore> {
    Orchestrator::new(
        Arc::new(FakePms::new()),
        Arc::new(FakePsp::new()),
        Arc::new(FakeStore::new()),
        Duration::from_secs(900),
        Duration::from_secs(1800),
    )
}

fn sample_input() -> InitializeInput {
    InitializeInput {
        listing_id: "listing-1".to_string(),
        check_in: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        check_out: NaiveDate::from_ymd_opt(2026, 8, 4).unwrap(),
        guests: Guests {
            adults: 2,
            children: 0,
            infants: 0,
        },
        coupon_code: None,
        metadata: CheckoutMetadata::default(),
    }
}

#[tokio::test]
async fn happy_path_reaches_booked_with_a_booking_code() {
    let orch = orchestrator();
    let now = Utc::now();

    let checkout = orch.initialize_checkout(sample_input(), now).await.unwrap();
    assert_eq!(checkout.state, CheckoutState::Initiated);

    orch.update_guest_info(
        checkout.checkout_id,
        GuestInfo {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            document: None,
        },
        now,
    )
    .await
    .unwrap();

    let held = orch.create_hold(checkout.checkout_id, now).await.unwrap();
    assert_eq!(held.state, CheckoutState::HoldCreated);
    assert!(held.pms_reservation_id.is_some());

    let (with_intent, client_secret) = orch.create_payment_intent(checkout.checkout_id, now).await.unwrap();
    assert_eq!(with_intent.state, CheckoutState::PaymentCreated);
    assert!(!client_secret.is_empty());

    let payment_intent_id = with_intent.psp_payment_intent_id.clone().unwrap();
    orch.psp.mark_succeeded(&payment_intent_id).await;

    let booked = orch
        .handle_payment_succeeded(checkout.checkout_id, &payment_intent_id, now)
        .await
        .unwrap();

    assert_eq!(booked.state, CheckoutState::Booked);
    assert!(booked.pms_booking_code.is_some());
}
