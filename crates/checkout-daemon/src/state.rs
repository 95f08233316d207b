//! Shared runtime state for the checkout daemon. Generic over the same
//! three boundary types as the orchestrator so tests can wire the router
//! against `checkout-testkit`'s fakes instead of live Postgres/PMS/PSP.

use std::sync::Arc;
use std::time::Duration;

use checkout_orchestrator::Orchestrator;
use checkout_pms::PmsAdapter;
use checkout_psp::PspAdapter;
use checkout_store::Store;

pub struct AppState<P: PmsAdapter, S: PspAdapter, D: Store> {
    pub orchestrator: Arc<Orchestrator<P, S, D>>,
    pub idempotency_ttl: Duration,
    pub webhook_dedup_ttl: Duration,
    pub psp_webhook_secret: Arc<String>,
    pub job_auth_token: Arc<String>,
}

impl<P: PmsAdapter, S: PspAdapter, D: Store> Clone for AppState<P, S, D> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            idempotency_ttl: self.idempotency_ttl,
            webhook_dedup_ttl: self.webhook_dedup_ttl,
            psp_webhook_secret: self.psp_webhook_secret.clone(),
            job_auth_token: self.job_auth_token.clone(),
        }
    }
}
