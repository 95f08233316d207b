//! Document Store Gateway (checkouts, idempotency_keys, webhook_events) and
//! the Idempotency Store, both backed by Postgres via `sqlx`.
//!
//! The three logical collections of the data model become three tables.
//! `Store::transactional_update` is the one path through which every
//! state-machine mutation flows: it loads the row `FOR UPDATE` inside a
//! `SERIALIZABLE` transaction, hands the caller an owned `Checkout` to
//! mutate (including any external PMS call the caller needs to make before
//! committing), then persists the result and commits. Serialization
//! failures are retried with bounded backoff so callers never see `40001`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use checkout_schemas::{Checkout, CheckoutError, GuestInfo, IdempotencyRecord};
use checkout_state_machine::CheckoutState;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

pub const ENV_DATABASE_URL: &str = "CHECKOUT_DATABASE_URL";

const MAX_TX_ATTEMPTS: u32 = 3;

pub async fn connect_from_env() -> anyhow::Result<PgPool> {
    let url = std::env::var(ENV_DATABASE_URL)
        .with_context(|| format!("missing env var {ENV_DATABASE_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("checkout-store migrate failed")?;
    Ok(())
}

fn internal(e: sqlx::Error) -> CheckoutError {
    CheckoutError::Internal(e.to_string())
}

fn is_serialization_failure(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("40001"))
}

fn row_to_checkout(doc: serde_json::Value) -> Result<Checkout, CheckoutError> {
    serde_json::from_value(doc).map_err(|e| CheckoutError::Internal(format!("corrupt checkout document: {e}")))
}

/// The store interface the orchestrator is generic over. A fake,
/// in-memory implementation lives in `checkout-testkit` for integration
/// tests that don't need a real Postgres instance.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_checkout(&self, checkout: Checkout) -> Result<Checkout, CheckoutError>;
    async fn get_checkout(&self, id: Uuid) -> Result<Checkout, CheckoutError>;
    async fn update_guest(
        &self,
        id: Uuid,
        guest: GuestInfo,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError>;

    /// Load-mutate-persist under a serializable transaction, retried on
    /// conflict. `f` may be invoked more than once if a retry occurs, so it
    /// must be safe to re-run (any external call it makes should itself be
    /// idempotent under the same checkout id / reservation id).
    async fn transactional_update<F, Fut>(&self, id: Uuid, f: F) -> Result<Checkout, CheckoutError>
    where
        F: Fn(Checkout) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Checkout, CheckoutError>> + Send;

    /// Checkouts in `state` whose `hold_expires_at` is before `now`, oldest
    /// first, capped at `limit`. Used by the hold expiration sweep.
    async fn list_expirable(
        &self,
        state: CheckoutState,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Checkout>, CheckoutError>;

    // Idempotency Store (C4)
    async fn idempotency_lookup(
        &self,
        endpoint: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, CheckoutError>;

    /// Fail-open: storage failures are logged and swallowed. A missed
    /// capture merely permits a future retry to re-execute the request.
    async fn idempotency_capture(
        &self,
        endpoint: &str,
        key: &str,
        status: u16,
        body: serde_json::Value,
        ttl: Duration,
        now: DateTime<Utc>,
    );

    async fn webhook_is_processed(&self, event_id: &str, now: DateTime<Utc>) -> Result<bool, CheckoutError>;

    /// Idempotent: marking an already-processed event again is a no-op.
    async fn webhook_mark_processed(
        &self,
        event_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Checkout, CheckoutError> {
        let row = sqlx::query(
            r#"select doc from checkouts where checkout_id = $1 for update"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(internal)?
        .ok_or_else(|| CheckoutError::NotFound(format!("checkout {id}")))?;

        row_to_checkout(row.try_get("doc").map_err(internal)?)
    }

    async fn save(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        checkout: &Checkout,
    ) -> Result<(), CheckoutError> {
        let doc = serde_json::to_value(checkout)
            .map_err(|e| CheckoutError::Internal(format!("checkout serialize failed: {e}")))?;

        sqlx::query(
            r#"
            update checkouts
               set state = $1,
                   hold_expires_at = $2,
                   doc = $3,
                   updated_at = $4
             where checkout_id = $5
            "#,
        )
        .bind(checkout.state.as_str())
        .bind(checkout.hold_expires_at)
        .bind(doc)
        .bind(checkout.updated_at)
        .bind(checkout.checkout_id)
        .execute(&mut **tx)
        .await
        .map_err(internal)?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_checkout(&self, checkout: Checkout) -> Result<Checkout, CheckoutError> {
        let doc = serde_json::to_value(&checkout)
            .map_err(|e| CheckoutError::Internal(format!("checkout serialize failed: {e}")))?;

        sqlx::query(
            r#"
            insert into checkouts (checkout_id, state, hold_expires_at, doc, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(checkout.checkout_id)
        .bind(checkout.state.as_str())
        .bind(checkout.hold_expires_at)
        .bind(doc)
        .bind(checkout.created_at)
        .bind(checkout.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(checkout)
    }

    async fn get_checkout(&self, id: Uuid) -> Result<Checkout, CheckoutError> {
        let row = sqlx::query(r#"select doc from checkouts where checkout_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| CheckoutError::NotFound(format!("checkout {id}")))?;

        row_to_checkout(row.try_get("doc").map_err(internal)?)
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
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut tx = self.pool.begin().await.map_err(internal)?;
            sqlx::query("set transaction isolation level serializable")
                .execute(&mut *tx)
                .await
                .map_err(internal)?;

            let loaded = Self::load_for_update(&mut tx, id).await?;
            let mutated = match f(loaded).await {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.rollback().await;
                    return Err(e);
                }
            };

            Self::save(&mut tx, &mutated).await?;

            match tx.commit().await {
                Ok(()) => return Ok(mutated),
                Err(e) if is_serialization_failure(&e) && attempt < MAX_TX_ATTEMPTS => {
                    tracing::warn!(attempt, checkout_id = %id, "transaction conflict, retrying");
                    tokio::time::sleep(Duration::from_millis(20 * attempt as u64)).await;
                    continue;
                }
                Err(e) => return Err(internal(e)),
            }
        }
    }

    async fn list_expirable(
        &self,
        state: CheckoutState,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Checkout>, CheckoutError> {
        let rows = sqlx::query(
            r#"
            select doc from checkouts
             where state = $1 and hold_expires_at < $2
             order by hold_expires_at asc
             limit $3
            "#,
        )
        .bind(state.as_str())
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter()
            .map(|r| row_to_checkout(r.try_get("doc").map_err(internal)?))
            .collect()
    }

    async fn idempotency_lookup(
        &self,
        endpoint: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, CheckoutError> {
        let row = sqlx::query(
            r#"
            select endpoint, idempotency_key, status, body, created_at, expires_at
              from idempotency_keys
             where endpoint = $1 and idempotency_key = $2 and expires_at > $3
            "#,
        )
        .bind(endpoint)
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        let Some(row) = row else { return Ok(None) };
        let status: Option<i32> = row.try_get("status").map_err(internal)?;
        Ok(Some(IdempotencyRecord {
            endpoint: row.try_get("endpoint").map_err(internal)?,
            idempotency_key: row.try_get("idempotency_key").map_err(internal)?,
            status: status.unwrap_or(0) as u16,
            body: row.try_get("body").map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
            expires_at: row.try_get("expires_at").map_err(internal)?,
        }))
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
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));

        let res = sqlx::query(
            r#"
            insert into idempotency_keys (endpoint, idempotency_key, status, body, created_at, expires_at)
            values ($1, $2, $3, $4, $5, $6)
            on conflict (endpoint, idempotency_key) do nothing
            "#,
        )
        .bind(endpoint)
        .bind(key)
        .bind(status as i32)
        .bind(body)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = res {
            tracing::warn!(endpoint, key, error = %e, "idempotency capture failed, continuing fail-open");
        }
    }

    async fn webhook_is_processed(&self, event_id: &str, now: DateTime<Utc>) -> Result<bool, CheckoutError> {
        let row = sqlx::query(
            r#"select 1 as present from webhook_events where event_id = $1 and expires_at > $2"#,
        )
        .bind(event_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        Ok(row.is_some())
    }

    async fn webhook_mark_processed(
        &self,
        event_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::days(7));

        sqlx::query(
            r#"
            insert into webhook_events (event_id, processed_at, expires_at)
            values ($1, $2, $3)
            on conflict (event_id) do nothing
            "#,
        )
        .bind(event_id)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }
}
