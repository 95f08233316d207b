//! Webhook signature verification.
//!
//! The signature header has the shape `t=<unix_ts>,v1=<hex hmac>`. The HMAC
//! is computed over `{timestamp}.{raw_body}` with the webhook secret, and
//! compared in constant time — a naive `==` on the hex strings would leak
//! timing information about how many leading bytes matched.

use checkout_schemas::CheckoutError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How old a signed timestamp may be before it's rejected as stale (replay
/// protection independent of the webhook-event-id dedup layer).
const TOLERANCE_SECS: i64 = 300;

fn parse_header(header: &str) -> Option<(i64, String)> {
    let mut ts: Option<i64> = None;
    let mut v1: Option<String> = None;
    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => ts = v.parse().ok(),
            (Some("v1"), Some(v)) => v1 = Some(v.to_string()),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

/// Verify `signature_header` against `payload` using `webhook_secret`.
/// `now` is injected so verification stays deterministic in tests.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    now_unix: i64,
) -> Result<(), CheckoutError> {
    let (timestamp, expected_hex) =
        parse_header(signature_header).ok_or(CheckoutError::PspSignatureInvalid)?;

    if (now_unix - timestamp).abs() > TOLERANCE_SECS {
        return Err(CheckoutError::PspSignatureInvalid);
    }

    let expected_bytes = hex::decode(&expected_hex).map_err(|_| CheckoutError::PspSignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| CheckoutError::Internal("invalid webhook secret length".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&expected_bytes)
        .map_err(|_| CheckoutError::PspSignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let header = sign(payload, "whsec_test", 1_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_000_000).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign(b"original", "whsec_test", 1_000_000);
        assert!(verify_webhook_signature(b"tampered", &header, "whsec_test", 1_000_000).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"payload";
        let header = sign(payload, "whsec_test", 1_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_000_000 + 301).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = b"payload";
        let header = sign(payload, "whsec_test", 1_000_000);
        assert!(verify_webhook_signature(payload, &header, "whsec_other", 1_000_000).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_webhook_signature(b"payload", "garbage", "whsec_test", 1_000_000).is_err());
    }
}
