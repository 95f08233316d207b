use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keyed by `(endpoint, idempotency_key)`. Captures the response the first
/// call produced so retried requests replay it instead of re-executing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub endpoint: String,
    pub idempotency_key: String,
    pub status: u16,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Keyed by PSP event id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
