//! Checkout Orchestrator (C6): the sole caller of the state machine and
//! store transactions, generic over the PMS/PSP adapters and the store —
//! the same generic-over-the-boundary shape used for routing broker
//! operations through a single choke-point.

pub mod expiry;
pub mod reconcile;
pub mod webhook;

use chrono::{DateTime, NaiveDate, Utc};
use checkout_pms::types::{
    CreateReservationRequest, PaymentMethod, RegisterPaymentRequest, ReservationStatus,
    UpdateReservationRequest,
};
use checkout_pms::PmsAdapter;
use checkout_psp::PspAdapter;
use checkout_schemas::{
    Actor, Checkout, CheckoutError, CheckoutMetadata, CheckoutState, GuestInfo, Guests, LockedQuote,
    Money, PriceBreakdown, RefundFlag, StateHistoryEntry,
};
use checkout_state_machine::{validate, TransitionOutcome};
use checkout_store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct InitializeInput {
    pub listing_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: Guests,
    pub coupon_code: Option<String>,
    pub metadata: CheckoutMetadata,
}

pub struct Orchestrator<P: PmsAdapter, S: PspAdapter, D: Store> {
    pub pms: Arc<P>,
    pub psp: Arc<S>,
    pub store: Arc<D>,
    pub hold_ttl: Duration,
    pub quote_ttl: Duration,
}

impl<P: PmsAdapter, S: PspAdapter, D: Store> Orchestrator<P, S, D> {
    pub fn new(pms: Arc<P>, psp: Arc<S>, store: Arc<D>, hold_ttl: Duration, quote_ttl: Duration) -> Self {
        Self {
            pms,
            psp,
            store,
            hold_ttl,
            quote_ttl,
        }
    }

    /// Apply a validated transition to `checkout`, appending the history
    /// entry and bumping `updated_at`. Returns the mutated checkout; does
    /// not persist it. The one caller-visible exception to I6 (the seed
    /// entry at `initialize`) is handled by the caller directly, not here.
    fn apply_transition(
        checkout: &mut Checkout,
        target: CheckoutState,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, CheckoutError> {
        let outcome = validate(checkout.state, target).map_err(|_| CheckoutError::InvalidState {
            from: checkout.state.as_str().to_string(),
            attempted: target.as_str().to_string(),
        })?;

        if outcome == TransitionOutcome::Applied {
            checkout.state_history.push(StateHistoryEntry {
                from: checkout.state,
                to: target,
                timestamp: now,
                reason,
                actor,
            });
            checkout.state = target;
            checkout.updated_at = now;
        }

        Ok(outcome)
    }

    /// Lenient counterpart used by racy callers (webhook handler, expiry
    /// sweep): `None` instead of an error when the checkout has already
    /// moved past the attempted target.
    fn try_apply_transition(
        checkout: &mut Checkout,
        target: CheckoutState,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<TransitionOutcome> {
        Self::apply_transition(checkout, target, actor, reason, now).ok()
    }

    pub async fn initialize_checkout(
        &self,
        input: InitializeInput,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError> {
        if input.listing_id.trim().is_empty() {
            return Err(CheckoutError::Validation("listingId must not be empty".to_string()));
        }
        if input.check_in < now.date_naive() {
            return Err(CheckoutError::Validation("checkIn must not be in the past".to_string()));
        }
        if input.check_out <= input.check_in {
            return Err(CheckoutError::Validation("checkOut must be after checkIn".to_string()));
        }
        if input.guests.adults < 1 {
            return Err(CheckoutError::Validation("guests.adults must be at least 1".to_string()));
        }

        let _listing = self.pms.get_listing_detail(&input.listing_id).await?;
        let price = self
            .pms
            .calculate_price(
                &input.listing_id,
                input.check_in,
                input.check_out,
                &input.guests,
                input.coupon_code.as_deref(),
            )
            .await?;

        let canonical = Checkout::canonical_quote_input(
            &input.listing_id,
            input.check_in,
            input.check_out,
            &input.guests,
            input.coupon_code.as_deref(),
        );
        let hash = checkout_schemas::hashing::sha256_hex(canonical.as_bytes());

        let quote = LockedQuote {
            total: price.total,
            currency: price.currency,
            breakdown: price.breakdown,
            hash,
            expires_at: now + chrono::Duration::from_std(self.quote_ttl).unwrap_or(chrono::Duration::minutes(30)),
        };

        let checkout_id = Uuid::new_v4();
        let checkout = Checkout {
            checkout_id,
            created_at: now,
            updated_at: now,
            state: CheckoutState::Initiated,
            // The seed entry is the one documented exception to I6: it
            // records the audit anchor for a checkout that has not yet
            // moved anywhere.
            state_history: vec![StateHistoryEntry {
                from: CheckoutState::Initiated,
                to: CheckoutState::Initiated,
                timestamp: now,
                reason: Some("initialized".to_string()),
                actor: Actor::User,
            }],
            listing_id: input.listing_id,
            check_in: input.check_in,
            check_out: input.check_out,
            guests: input.guests,
            coupon_code: input.coupon_code,
            quote,
            guest: None,
            pms_reservation_id: None,
            pms_booking_code: None,
            psp_payment_intent_id: None,
            hold_expires_at: None,
            retry_count: 0,
            metadata: input.metadata,
            refund_flag: RefundFlag::default(),
        };

        self.store.insert_checkout(checkout).await
    }

    pub async fn update_guest_info(
        &self,
        checkout_id: Uuid,
        guest: GuestInfo,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError> {
        let current = self.store.get_checkout(checkout_id).await?;
        if !matches!(
            current.state,
            CheckoutState::Initiated | CheckoutState::HoldCreated | CheckoutState::PaymentCreated
        ) {
            return Err(CheckoutError::InvalidStateForUpdate {
                from: current.state.as_str().to_string(),
            });
        }
        self.store.update_guest(checkout_id, guest, now).await
    }

    pub async fn create_hold(&self, checkout_id: Uuid, now: DateTime<Utc>) -> Result<Checkout, CheckoutError> {
        let pms = self.pms.clone();
        let hold_ttl = self.hold_ttl;

        self.store
            .transactional_update(checkout_id, move |mut checkout| {
                let pms = pms.clone();
                async move {
                    // Idempotent fast path: a prior attempt already landed.
                    if checkout.state == CheckoutState::HoldCreated || checkout.pms_reservation_id.is_some() {
                        return Ok(checkout);
                    }
                    if checkout.state != CheckoutState::Initiated {
                        return Err(CheckoutError::InvalidState {
                            from: checkout.state.as_str().to_string(),
                            attempted: CheckoutState::HoldCreated.as_str().to_string(),
                        });
                    }
                    let guest = checkout.guest.as_ref().ok_or(CheckoutError::GuestRequired)?;
                    if !guest.email.contains('@') {
                        return Err(CheckoutError::GuestRequired);
                    }

                    let reservation = pms
                        .create_reservation(CreateReservationRequest {
                            listing_id: checkout.listing_id.clone(),
                            check_in: checkout.check_in,
                            check_out: checkout.check_out,
                            guests: checkout.guests.clone(),
                            idempotency_key: checkout.checkout_id.to_string(),
                        })
                        .await?;

                    // Written before the transition is applied so a crash
                    // between the PMS call and commit still leaves the
                    // reservation id discoverable on retry; an orphan left
                    // by a failed commit is swept by the reconciliation
                    // pass in `reconcile`.
                    checkout.pms_reservation_id = Some(reservation.pms_reservation_id);
                    checkout.hold_expires_at = Some(
                        now + chrono::Duration::from_std(hold_ttl).unwrap_or(chrono::Duration::minutes(15)),
                    );

                    Self::apply_transition(&mut checkout, CheckoutState::HoldCreated, Actor::User, None, now)?;
                    Ok(checkout)
                }
            })
            .await
    }

    pub async fn create_payment_intent(
        &self,
        checkout_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Checkout, String), CheckoutError> {
        let existing = self.store.get_checkout(checkout_id).await?;

        if let Some(payment_intent_id) = existing.psp_payment_intent_id.clone() {
            let intent = self.psp.retrieve_payment_intent(&payment_intent_id).await?;
            return Ok((existing, intent.client_secret));
        }

        if existing.state != CheckoutState::HoldCreated {
            return Err(CheckoutError::InvalidState {
                from: existing.state.as_str().to_string(),
                attempted: CheckoutState::PaymentCreated.as_str().to_string(),
            });
        }
        if !existing.quote_hash_is_valid() {
            return Err(CheckoutError::QuoteTampered);
        }
        if existing.quote.expires_at <= now {
            return Err(CheckoutError::QuoteExpired);
        }

        let pms_reservation_id = existing
            .pms_reservation_id
            .clone()
            .ok_or_else(|| CheckoutError::Internal("HOLD_CREATED without pmsReservationId".to_string()))?;

        let mut metadata = BTreeMap::new();
        metadata.insert("checkoutId".to_string(), checkout_id.to_string());
        metadata.insert("pmsReservationId".to_string(), pms_reservation_id);

        let intent = self
            .psp
            .create_payment_intent(existing.quote.total, &existing.quote.currency, metadata)
            .await?;

        let payment_intent_id = intent.payment_intent_id.clone();
        let client_secret = intent.client_secret.clone();

        let updated = self
            .store
            .transactional_update(checkout_id, move |mut checkout| {
                let payment_intent_id = payment_intent_id.clone();
                async move {
                    if checkout.psp_payment_intent_id.is_none() {
                        checkout.psp_payment_intent_id = Some(payment_intent_id);
                        Self::apply_transition(&mut checkout, CheckoutState::PaymentCreated, Actor::User, None, now)?;
                    }
                    Ok(checkout)
                }
            })
            .await?;

        Ok((updated, client_secret))
    }

    /// Webhook-driven. Idempotent under replay: a PAID/BOOKED checkout
    /// re-entering here simply re-runs the PMS tolerant-of-replay steps
    /// (or returns immediately if already BOOKED).
    pub async fn handle_payment_succeeded(
        &self,
        checkout_id: Uuid,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError> {
        let paid = self
            .store
            .transactional_update(checkout_id, move |mut checkout| async move {
                if Self::try_apply_transition(&mut checkout, CheckoutState::Paid, Actor::Webhook, None, now).is_none()
                {
                    // Could not reach PAID (e.g. already EXPIRED). Flag for
                    // a refund instead of silently dropping captured funds —
                    // see the resolution of the late-webhook open question.
                    if checkout.state == CheckoutState::Expired && !checkout.refund_flag.required {
                        checkout.refund_flag = RefundFlag {
                            required: true,
                            reason: Some("payment_intent.succeeded arrived after hold expiry".to_string()),
                            flagged_at: Some(now),
                        };
                        checkout.updated_at = now;
                    }
                }
                Ok(checkout)
            })
            .await?;

        if paid.state == CheckoutState::Booked {
            return Ok(paid);
        }
        if paid.state != CheckoutState::Paid {
            // Lost the race to EXPIRED (or any other terminal state); the
            // refund flag above (if set) is the only remaining action.
            return Ok(paid);
        }

        let pms_reservation_id = paid
            .pms_reservation_id
            .clone()
            .ok_or_else(|| CheckoutError::Internal("PAID without pmsReservationId".to_string()))?;

        self.pms
            .update_reservation(
                &pms_reservation_id,
                UpdateReservationRequest {
                    target_status: ReservationStatus::Booked,
                },
            )
            .await?;

        self.pms
            .register_payment(RegisterPaymentRequest {
                pms_reservation_id: pms_reservation_id.clone(),
                amount: paid.quote.total,
                currency: paid.quote.currency.clone(),
                method: PaymentMethod::CreditCard,
                reference: payment_intent_id.to_string(),
            })
            .await?;

        let reservation = self.pms.get_reservation(&pms_reservation_id).await?;
        let booking_code = reservation.booking_code;

        self.store
            .transactional_update(checkout_id, move |mut checkout| {
                let booking_code = booking_code.clone();
                async move {
                    checkout.pms_booking_code = booking_code;
                    Self::apply_transition(&mut checkout, CheckoutState::Booked, Actor::System, None, now)?;
                    Ok(checkout)
                }
            })
            .await
    }

    /// Never transitions; the hold TTL is the authoritative timeout for a
    /// failed payment.
    pub async fn handle_payment_failed(&self, checkout_id: Uuid, reason: &str) -> Result<(), CheckoutError> {
        tracing::info!(%checkout_id, reason, "payment failed, no state transition; hold TTL governs");
        Ok(())
    }

    /// Hard-capped at 30s regardless of the caller's request.
    pub async fn wait_for_confirmation(
        &self,
        checkout_id: Uuid,
        max_wait: Duration,
    ) -> Result<Checkout, CheckoutError> {
        let capped = max_wait.min(Duration::from_secs(30));
        let deadline = tokio::time::Instant::now() + capped;

        loop {
            let checkout = self.store.get_checkout(checkout_id).await?;
            if matches!(
                checkout.state,
                CheckoutState::Booked | CheckoutState::Failed | CheckoutState::Expired
            ) {
                return Ok(checkout);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(checkout);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    pub async fn cancel_checkout(
        &self,
        checkout_id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError> {
        let current = self.store.get_checkout(checkout_id).await?;
        if let Some(pms_reservation_id) = &current.pms_reservation_id {
            match self.pms.cancel_reservation(pms_reservation_id).await {
                Ok(()) => {}
                Err(CheckoutError::PmsClientError { status: 404, .. }) => {}
                Err(e) => return Err(e),
            }
        }

        self.store
            .transactional_update(checkout_id, move |mut checkout| {
                let reason = reason.clone();
                async move {
                    Self::apply_transition(&mut checkout, CheckoutState::Canceled, Actor::User, reason, now)?;
                    Ok(checkout)
                }
            })
            .await
    }
}

/// Shared Locked Quote construction helper re-exported for tests that need
/// to build a synthetic breakdown without a live PMS price call.
pub fn zero_breakdown() -> PriceBreakdown {
    PriceBreakdown {
        subtotal: Money::zero(),
        cleaning_fee: Money::zero(),
        service_fee: Money::zero(),
        taxes: Money::zero(),
    }
}
