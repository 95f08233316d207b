//! Scenario: Past Check-In Is Rejected At Initialization
//!
//! # Invariant under test
//!
//! `initializeCheckout` never reaches the PMS for a booking window that has
//! already started — the date validation runs before `get_listing_detail`
//! or `calculate_price` are called.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{InitializeInput, Orchestrator};
use checkout_schemas::{ApiErrorKind, CheckoutMetadata, Guests};
use checkout_testkit::{FakePms, FakePsp, FakeStore};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

#[tokio::test]
async fn checkin_in_the_past_is_rejected() {
    let orch = Orchestrator::new(
        Arc::new(FakePms::new()),
        Arc::new(FakePsp::new()),
        Arc::new(FakeStore::new()),
        Duration::from_secs(900),
        Duration::from_secs(1800),
    );
    let now = Utc::now();
    let yesterday = now.date_naive() - ChronoDuration::days(1);

    let err = orch
        .initialize_checkout(
            InitializeInput {
                listing_id: "listing-1".to_string(),
                check_in: yesterday,
                check_out: yesterday + ChronoDuration::days(2),
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
        .unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::Validation);
}

#[tokio::test]
async fn checkout_on_or_before_checkin_is_rejected() {
    let orch = Orchestrator::new(
        Arc::new(FakePms::new()),
        Arc::new(FakePsp::new()),
        Arc::new(FakeStore::new()),
        Duration::from_secs(900),
        Duration::from_secs(1800),
    );
    let now = Utc::now();
    let check_in = NaiveDate::from_ymd_opt(2026, 12, 10).unwrap();

    let err = orch
        .initialize_checkout(
            InitializeInput {
                listing_id: "listing-1".to_string(),
                check_in,
                check_out: check_in,
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
        .unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::Validation);
}
