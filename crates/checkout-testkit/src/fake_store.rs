//! In-memory `Store` for orchestrator tests that don't need a real
//! Postgres instance. A single mutex around the whole map gives the same
//! "one writer at a time per checkout" guarantee `PgStore` gets from
//! `SELECT ... FOR UPDATE`, without needing retry-on-conflict logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use checkout_schemas::{Checkout, CheckoutError, GuestInfo, IdempotencyRecord};
use checkout_state_machine::CheckoutState;
use checkout_store::Store;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
struct IdempotencyEntry {
    record: IdempotencyRecord,
}

#[derive(Default)]
struct State {
    checkouts: HashMap<Uuid, Checkout>,
    idempotency: HashMap<(String, String), IdempotencyEntry>,
    webhooks: HashMap<String, DateTime<Utc>>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only inspector: snapshot a checkout without going through the
    /// trait's `Result`-wrapping `get_checkout`.
    pub async fn peek(&self, id: Uuid) -> Option<Checkout> {
        self.state.lock().await.checkouts.get(&id).cloned()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn insert_checkout(&self, checkout: Checkout) -> Result<Checkout, CheckoutError> {
        let mut state = self.state.lock().await;
        state.checkouts.insert(checkout.checkout_id, checkout.clone());
        Ok(checkout)
    }

    async fn get_checkout(&self, id: Uuid) -> Result<Checkout, CheckoutError> {
        self.state
            .lock()
            .await
            .checkouts
            .get(&id)
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound(format!("checkout {id}")))
    }

    async fn update_guest(
        &self,
        id: Uuid,
        guest: GuestInfo,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError> {
        self.transactional_update(id, move |mut checkout| {
            let guest = guest.clone();
            async move {
                checkout.guest = Some(guest);
                checkout.updated_at = now;
                Ok(checkout)
            }
        })
        .await
    }

    async fn transactional_update<F, Fut>(&self, id: Uuid, f: F) -> Result<Checkout, CheckoutError>
    where
        F: Fn(Checkout) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Checkout, CheckoutError>> + Send,
    {
        let mut state = self.state.lock().await;
        let current = state
            .checkouts
            .get(&id)
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound(format!("checkout {id}")))?;

        let mutated = f(current).await?;
        state.checkouts.insert(id, mutated.clone());
        Ok(mutated)
    }

    async fn list_expirable(
        &self,
        state: CheckoutState,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Checkout>, CheckoutError> {
        let guard = self.state.lock().await;
        let mut matching: Vec<Checkout> = guard
            .checkouts
            .values()
            .filter(|c| c.state == state)
            .filter(|c| c.hold_expires_at.map(|t| t < now).unwrap_or(false))
            .cloned()
            .collect();
        matching.sort_by_key(|c| c.hold_expires_at);
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn idempotency_lookup(
        &self,
        endpoint: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, CheckoutError> {
        let guard = self.state.lock().await;
        Ok(guard
            .idempotency
            .get(&(endpoint.to_string(), key.to_string()))
            .map(|e| e.record.clone())
            .filter(|r| r.expires_at > now))
    }

    async fn idempotency_capture(
        &self,
        endpoint: &str,
        key: &str,
        status: u16,
        body: serde_json::Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        let mut guard = self.state.lock().await;
        let entry_key = (endpoint.to_string(), key.to_string());
        guard.idempotency.entry(entry_key).or_insert(IdempotencyEntry {
            record: IdempotencyRecord {
                endpoint: endpoint.to_string(),
                idempotency_key: key.to_string(),
                status,
                body,
                created_at: now,
                expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24)),
            },
        });
    }

    async fn webhook_is_processed(&self, event_id: &str, now: DateTime<Utc>) -> Result<bool, CheckoutError> {
        let guard = self.state.lock().await;
        Ok(guard.webhooks.get(event_id).map(|exp| *exp > now).unwrap_or(false))
    }

    async fn webhook_mark_processed(
        &self,
        event_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        let mut guard = self.state.lock().await;
        guard
            .webhooks
            .entry(event_id.to_string())
            .or_insert(now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::days(7)));
        Ok(())
    }
}
