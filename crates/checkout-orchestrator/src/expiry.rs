//! Hold expiration sweep (C8): a periodic job, not a per-request path.
//!
//! Scans `HOLD_CREATED` and `PAYMENT_CREATED` checkouts whose
//! `hold_expires_at` has passed, releases the PMS reservation best-effort,
//! and transitions each to `EXPIRED`. Uses the lenient transition so a
//! checkout that a concurrent request already moved past `HOLD_CREATED` (or
//! that a second sweeper already expired) is skipped rather than treated as
//! an error.

use chrono::{DateTime, Utc};
use checkout_pms::PmsAdapter;
use checkout_psp::PspAdapter;
use checkout_schemas::{Actor, CheckoutError, CheckoutState};
use checkout_store::Store;

use crate::Orchestrator;

const SWEEP_BATCH_LIMIT: i64 = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub expired_count: u32,
    pub error_count: u32,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.expired_count += other.expired_count;
        self.error_count += other.error_count;
    }
}

pub async fn sweep_expired_holds<P: PmsAdapter, S: PspAdapter, D: Store>(
    orchestrator: &Orchestrator<P, S, D>,
    now: DateTime<Utc>,
) -> Result<SweepReport, CheckoutError> {
    let mut report = SweepReport::default();
    for state in [CheckoutState::HoldCreated, CheckoutState::PaymentCreated] {
        let batch = sweep_state(orchestrator, state, now).await?;
        report.merge(batch);
    }
    Ok(report)
}

async fn sweep_state<P: PmsAdapter, S: PspAdapter, D: Store>(
    orchestrator: &Orchestrator<P, S, D>,
    state: CheckoutState,
    now: DateTime<Utc>,
) -> Result<SweepReport, CheckoutError> {
    let mut report = SweepReport::default();
    let expirable = orchestrator.store.list_expirable(state, now, SWEEP_BATCH_LIMIT).await?;

    for checkout in expirable {
        let checkout_id = checkout.checkout_id;

        if let Some(pms_reservation_id) = &checkout.pms_reservation_id {
            match orchestrator.pms.cancel_reservation(pms_reservation_id).await {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(%checkout_id, error = %e, "best-effort PMS release on expiry failed, continuing");
                }
            }
        }

        let result = orchestrator
            .store
            .transactional_update(checkout_id, move |mut checkout| async move {
                crate::Orchestrator::<P, S, D>::try_apply_transition(
                    &mut checkout,
                    CheckoutState::Expired,
                    Actor::System,
                    Some("hold expired".to_string()),
                    now,
                );
                Ok(checkout)
            })
            .await;

        match result {
            // A concurrent request may have already moved this checkout
            // past `HOLD_CREATED`/`PAYMENT_CREATED` (try_apply_transition is
            // then a no-op); only count it as expired if it actually landed.
            Ok(c) if c.state == CheckoutState::Expired => report.expired_count += 1,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(%checkout_id, error = %e, "hold expiration sweep failed for checkout");
                report.error_count += 1;
            }
        }
    }

    Ok(report)
}
