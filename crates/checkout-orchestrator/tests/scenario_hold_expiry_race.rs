//! Scenario: Hold Expiry Races a Late payment_intent.succeeded
//!
//! # Invariant under test
//!
//! Once the expiry sweep has moved a checkout to `EXPIRED`, a
//! `payment_intent.succeeded` webhook that arrives afterward cannot pull it
//! back to `PAID`/`BOOKED` — `try_apply_transition` loses gracefully — and
//! instead the checkout is flagged for a refund so captured funds are not
//! silently stranded.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{expiry, InitializeInput, Orchestrator};
use checkout_schemas::{CheckoutMetadata, CheckoutState, Guests, GuestInfo};
use checkout_store::Store;
use checkout_testkit::{FakePms, FakePsp, FakeStore};
use chrono::{NaiveDate, Utc};

#[tokio::test]
async fn late_webhook_after_sweep_is_flagged_for_refund_not_booked() {
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
                check_in: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
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
            first_name: "Margaret".to_string(),
            last_name: "Hamilton".to_string(),
            email: "margaret@example.com".to_string(),
            phone: None,
            document: None,
        },
        now,
    )
    .await
    .unwrap();

    orch.create_hold(checkout.checkout_id, now).await.unwrap();
    let (with_intent, _) = orch.create_payment_intent(checkout.checkout_id, now).await.unwrap();
    let payment_intent_id = with_intent.psp_payment_intent_id.clone().unwrap();

    // Fast-forward past the hold TTL and run the sweep.
    let later = now + chrono::Duration::seconds(1_000);
    let report = expiry::sweep_expired_holds(&orch, later).await.unwrap();
    assert_eq!(report.expired_count, 1);

    let expired = orch.store.get_checkout(checkout.checkout_id).await.unwrap();
    assert_eq!(expired.state, CheckoutState::Expired);

    // The payment succeeds anyway, late, from the PSP's point of view.
    orch.psp.mark_succeeded(&payment_intent_id).await;
    let result = orch
        .handle_payment_succeeded(checkout.checkout_id, &payment_intent_id, later)
        .await
        .unwrap();

    assert_eq!(result.state, CheckoutState::Expired);
    assert!(result.refund_flag.required);
}
