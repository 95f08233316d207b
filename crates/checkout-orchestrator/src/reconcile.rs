//! Stuck-checkout reconciliation (supplemental to the core sweep).
//!
//! `create_hold` calls the PMS before committing the transition, using the
//! checkout id as the idempotency key, so a retried hold attempt always
//! lands on the same PMS reservation rather than creating a second one.
//! The one gap that retry doesn't close: a client that calls `createHold`,
//! has the PMS call succeed, then never retries and never polls again
//! (crash, abandoned session) leaves a checkout parked in `INITIATED`
//! indefinitely with no `holdExpiresAt` for the expiry sweep to act on,
//! while the PMS side may or may not hold a reservation for it.
//!
//! This pass doesn't have a PMS reservation id to act on for those rows —
//! `INITIATED` checkouts never had one recorded — so it can only surface
//! candidates for operator review, not resolve them automatically.

use chrono::{DateTime, Utc};
use checkout_pms::PmsAdapter;
use checkout_psp::PspAdapter;
use checkout_schemas::{Checkout, CheckoutError};
use checkout_store::Store;

use crate::Orchestrator;

/// A checkout that has sat in `INITIATED` longer than `staleness` without
/// progressing to `HOLD_CREATED` or any terminal state.
pub struct StuckInitiated {
    pub checkout_id: uuid::Uuid,
    pub age: chrono::Duration,
}

pub async fn find_stuck_initiated<P: PmsAdapter, S: PspAdapter, D: Store>(
    orchestrator: &Orchestrator<P, S, D>,
    candidates: &[Checkout],
    staleness: std::time::Duration,
    now: DateTime<Utc>,
) -> Result<Vec<StuckInitiated>, CheckoutError> {
    let _ = orchestrator;
    let staleness = chrono::Duration::from_std(staleness).unwrap_or(chrono::Duration::hours(1));

    Ok(candidates
        .iter()
        .filter(|c| c.state == checkout_schemas::CheckoutState::Initiated)
        .filter_map(|c| {
            let age = now - c.created_at;
            (age > staleness).then_some(StuckInitiated {
                checkout_id: c.checkout_id,
                age,
            })
        })
        .collect())
}
