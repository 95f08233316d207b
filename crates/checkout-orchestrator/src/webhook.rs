//! Webhook ingress (C7): verify, dedup, dispatch, mark processed.
//!
//! Ordering matters: the raw body is verified before anything else is
//! trusted, the event id is checked against the dedup table before
//! dispatch so a replayed delivery never re-runs a handler, and the event
//! is only marked processed after the handler returns successfully — a
//! handler panic or error leaves the event unmarked so the PSP's own retry
//! redelivers it.

use chrono::{DateTime, Utc};
use checkout_pms::PmsAdapter;
use checkout_psp::{verify_and_decode_webhook, PspAdapter};
use checkout_schemas::CheckoutError;
use checkout_store::Store;
use std::time::Duration;
use uuid::Uuid;

use crate::Orchestrator;

pub async fn ingest_webhook<P: PmsAdapter, S: PspAdapter, D: Store>(
    orchestrator: &Orchestrator<P, S, D>,
    raw_body: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    dedup_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(), CheckoutError> {
    let event = verify_and_decode_webhook(raw_body, signature_header, webhook_secret, now.timestamp())?;

    if orchestrator.store.webhook_is_processed(&event.event_id, now).await? {
        tracing::info!(event_id = %event.event_id, "webhook already processed, skipping");
        return Ok(());
    }

    let checkout_id = event
        .metadata
        .get("checkoutId")
        .and_then(|s| Uuid::parse_str(s).ok());

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let checkout_id = checkout_id
                .ok_or_else(|| CheckoutError::Internal("webhook missing checkoutId metadata".to_string()))?;
            let payment_intent_id = event
                .payment_intent_id
                .as_deref()
                .ok_or_else(|| CheckoutError::Internal("webhook missing paymentIntentId".to_string()))?;
            orchestrator
                .handle_payment_succeeded(checkout_id, payment_intent_id, now)
                .await?;
        }
        "payment_intent.payment_failed" => {
            if let Some(checkout_id) = checkout_id {
                orchestrator
                    .handle_payment_failed(checkout_id, "payment_intent.payment_failed")
                    .await?;
            }
        }
        "charge.refunded" => {
            // Refund orchestration is out of scope; recording the event
            // (via the unconditional webhook_mark_processed below) is all
            // that's required here.
            tracing::info!(event_id = %event.event_id, "charge.refunded recorded, no further action");
        }
        other => {
            tracing::info!(event_type = other, "unhandled webhook event type, ignoring");
        }
    }

    orchestrator
        .store
        .webhook_mark_processed(&event.event_id, dedup_ttl, now)
        .await
}
