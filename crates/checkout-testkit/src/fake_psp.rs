//! Deterministic fake PSP adapter, plus a helper to build a correctly
//! signed webhook delivery for tests exercising `webhook::ingest_webhook`
//! end to end.

use async_trait::async_trait;
use checkout_psp::types::{PaymentIntent, PaymentIntentStatus};
use checkout_psp::PspAdapter;
use checkout_schemas::{CheckoutError, Money, CURRENCY};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

#[derive(Default)]
pub struct FakePsp {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    next_id: Mutex<u64>,
}

impl FakePsp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a previously created intent to `succeeded`, as the real PSP
    /// would after the card network confirms the charge.
    pub async fn mark_succeeded(&self, payment_intent_id: &str) {
        if let Some(intent) = self.intents.lock().await.get_mut(payment_intent_id) {
            intent.status = PaymentIntentStatus::Succeeded;
        }
    }
}

#[async_trait]
impl PspAdapter for FakePsp {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        _metadata: BTreeMap<String, String>,
    ) -> Result<PaymentIntent, CheckoutError> {
        if currency != CURRENCY {
            return Err(CheckoutError::UnsupportedCurrency {
                expected: CURRENCY.to_string(),
                got: currency.to_string(),
            });
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let payment_intent_id = format!("pi_test_{:06}", *next_id);

        let intent = PaymentIntent {
            payment_intent_id: payment_intent_id.clone(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            client_secret: format!("{payment_intent_id}_secret_{}", amount.smallest_units()),
        };

        self.intents.lock().await.insert(payment_intent_id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, CheckoutError> {
        self.intents
            .lock()
            .await
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| CheckoutError::PspError(format!("no such payment intent {payment_intent_id}")))
    }
}

/// Build a `t=...,v1=...` header for `payload` the way the real PSP would,
/// so tests can hand a raw body + header straight to `ingest_webhook`.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key of any length is valid");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
