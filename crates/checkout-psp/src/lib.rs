//! PSP Adapter (C2): PaymentIntent create/retrieve and webhook
//! verification/parsing.

pub mod signature;
pub mod types;

use async_trait::async_trait;
use checkout_schemas::{CheckoutError, Money, CURRENCY};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use types::*;

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PspAdapter: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentIntent, CheckoutError>;

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, CheckoutError>;
}

pub struct HttpPspClient {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl HttpPspClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PspAdapter for HttpPspClient {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentIntent, CheckoutError> {
        if currency != CURRENCY {
            return Err(CheckoutError::UnsupportedCurrency {
                expected: CURRENCY.to_string(),
                got: currency.to_string(),
            });
        }

        let req = CreatePaymentIntentRequest {
            amount,
            currency: currency.to_string(),
            metadata,
        };

        let resp = self
            .http
            .post(self.url("/payment_intents"))
            .bearer_auth(&self.secret_key)
            .timeout(WRITE_TIMEOUT)
            .json(&req)
            .send()
            .await
            .map_err(|e| CheckoutError::PspError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CheckoutError::PspError(format!(
                "create_payment_intent failed: {}",
                resp.status()
            )));
        }

        resp.json::<PaymentIntent>()
            .await
            .map_err(|e| CheckoutError::Internal(format!("psp response decode failed: {e}")))
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, CheckoutError> {
        let resp = self
            .http
            .get(self.url(&format!("/payment_intents/{payment_intent_id}")))
            .bearer_auth(&self.secret_key)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .map_err(|e| CheckoutError::PspError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CheckoutError::PspError(format!(
                "retrieve_payment_intent failed: {}",
                resp.status()
            )));
        }

        resp.json::<PaymentIntent>()
            .await
            .map_err(|e| CheckoutError::Internal(format!("psp response decode failed: {e}")))
    }
}

/// Verify and decode a raw webhook delivery. Callers pass the raw body
/// (never a re-serialized one — signatures are computed over exact bytes)
/// and the signature header straight off the HTTP request.
pub fn verify_and_decode_webhook(
    raw_body: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    now_unix: i64,
) -> Result<WebhookEvent, CheckoutError> {
    signature::verify_webhook_signature(raw_body, signature_header, webhook_secret, now_unix)?;

    serde_json::from_slice::<WebhookEvent>(raw_body)
        .map_err(|e| CheckoutError::PspError(format!("malformed webhook payload: {e}")))
}
