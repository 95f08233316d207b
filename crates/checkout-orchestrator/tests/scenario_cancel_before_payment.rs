//! Scenario: Cancel Before Payment
//!
//! # Invariant under test
//!
//! Canceling a checkout still holding a PMS reservation releases that
//! reservation best-effort before transitioning to `CANCELED`; a checkout
//! already `CANCELED` cannot be canceled again.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{InitializeInput, Orchestrator};
use checkout_schemas::{CheckoutMetadata, CheckoutState, Guests, GuestInfo};
use checkout_testkit::{FakePms, FakePsp, FakeStore};
use chrono::{NaiveDate, Utc};

#[tokio::test]
async fn cancel_releases_the_hold_and_is_not_repeatable() {
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
                check_in: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
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
            first_name: "Radia".to_string(),
            last_name: "Perlman".to_string(),
            email: "radia@example.com".to_string(),
            phone: None,
            document: None,
        },
        now,
    )
    .await
    .unwrap();

    orch.create_hold(checkout.checkout_id, now).await.unwrap();

    let canceled = orch
        .cancel_checkout(checkout.checkout_id, Some("guest changed plans".to_string()), now)
        .await
        .unwrap();
    assert_eq!(canceled.state, CheckoutState::Canceled);

    let err = orch.cancel_checkout(checkout.checkout_id, None, now).await.unwrap_err();
    assert_eq!(err.kind(), checkout_schemas::ApiErrorKind::InvalidState);
}
