//! Scenario: Webhook Replay Is a No-Op
//!
//! # Invariant under test
//!
//! The same `payment_intent.succeeded` delivery (same event id) processed
//! twice only books the reservation once. The second delivery is recognized
//! as already-processed by `webhook_is_processed` before the handler runs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::{webhook, InitializeInput, Orchestrator};
use checkout_schemas::{CheckoutMetadata, CheckoutState, Guests, GuestInfo};
use checkout_store::Store;
use checkout_testkit::{sign_webhook_payload, FakePms, FakePsp, FakeStore};
use chrono::{NaiveDate, Utc};

#[tokio::test]
async fn replayed_webhook_event_id_books_only_once() {
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
                check_in: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(),
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
            first_name: "Katherine".to_string(),
            last_name: "Johnson".to_string(),
            email: "katherine@example.com".to_string(),
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
    orch.psp.mark_succeeded(&payment_intent_id).await;

    let mut metadata = BTreeMap::new();
    metadata.insert("checkoutId".to_string(), checkout.checkout_id.to_string());
    metadata.insert("pmsReservationId".to_string(), with_intent.pms_reservation_id.clone().unwrap());

    let payload = serde_json::json!({
        "event_id": "evt_1",
        "event_type": "payment_intent.succeeded",
        "payment_intent_id": payment_intent_id,
        "metadata": metadata,
    })
    .to_string();

    let secret = "whsec_test";
    let signature = sign_webhook_payload(payload.as_bytes(), secret, now.timestamp());

    webhook::ingest_webhook(&orch, payload.as_bytes(), &signature, secret, Duration::from_secs(86400), now)
        .await
        .unwrap();

    let booked_once = orch.store.get_checkout(checkout.checkout_id).await.unwrap();
    assert_eq!(booked_once.state, CheckoutState::Booked);
    let history_len_after_first = booked_once.state_history.len();

    webhook::ingest_webhook(&orch, payload.as_bytes(), &signature, secret, Duration::from_secs(86400), now)
        .await
        .unwrap();

    let booked_twice = orch.store.get_checkout(checkout.checkout_id).await.unwrap();
    assert_eq!(booked_twice.state_history.len(), history_len_after_first);
}
