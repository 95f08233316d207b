//! Pure transition-graph validation for the checkout lifecycle.
//!
//! Store-independent on purpose: `checkout-store` wraps this in a document
//! transaction, `checkout-orchestrator` calls through the store, but the
//! graph itself has no knowledge of Postgres, HTTP, or time beyond what the
//! caller supplies. This split mirrors keeping the transition table pure and
//! pushing persistence to a thin wrapper around it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    Initiated,
    HoldCreated,
    PaymentCreated,
    Paid,
    Booked,
    Canceled,
    Expired,
    Failed,
}

impl CheckoutState {
    /// Terminal states are sinks, with the one documented exception of
    /// BOOKED -> CANCELED for post-booking cancellation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Booked
                | CheckoutState::Canceled
                | CheckoutState::Expired
                | CheckoutState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Initiated => "INITIATED",
            CheckoutState::HoldCreated => "HOLD_CREATED",
            CheckoutState::PaymentCreated => "PAYMENT_CREATED",
            CheckoutState::Paid => "PAID",
            CheckoutState::Booked => "BOOKED",
            CheckoutState::Canceled => "CANCELED",
            CheckoutState::Expired => "EXPIRED",
            CheckoutState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "INITIATED" => CheckoutState::Initiated,
            "HOLD_CREATED" => CheckoutState::HoldCreated,
            "PAYMENT_CREATED" => CheckoutState::PaymentCreated,
            "PAID" => CheckoutState::Paid,
            "BOOKED" => CheckoutState::Booked,
            "CANCELED" => CheckoutState::Canceled,
            "EXPIRED" => CheckoutState::Expired,
            "FAILED" => CheckoutState::Failed,
            _ => return None,
        })
    }

    /// States the hold-expiration sweep is allowed to act on.
    pub fn is_expirable(&self) -> bool {
        matches!(self, CheckoutState::HoldCreated | CheckoutState::PaymentCreated)
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who initiated a transition. Recorded on every `stateHistory` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    System,
    Webhook,
}

/// Reason a requested transition was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `target` is not reachable from `from` under the allowed graph.
    InvalidTransition {
        from: CheckoutState,
        target: CheckoutState,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::InvalidTransition { from, target } => {
                write!(f, "cannot transition {from} -> {target}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Allowed destinations for a given source state, per the graph in the
/// component design for the state machine.
pub fn allowed(from: CheckoutState) -> &'static [CheckoutState] {
    use CheckoutState::*;
    match from {
        Initiated => &[HoldCreated, Canceled, Failed],
        HoldCreated => &[PaymentCreated, Expired, Canceled, Failed],
        PaymentCreated => &[Paid, Expired, Canceled, Failed],
        Paid => &[Booked, Failed],
        Booked => &[Canceled],
        Canceled | Expired | Failed => &[],
    }
}

/// Outcome of attempting a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was applied; the checkout moves to `target`.
    Applied,
    /// `from == target`; idempotent no-op, no history entry is appended.
    NoopSameState,
}

/// Validate `from -> target` against the allowed graph.
///
/// This is the single source of truth both `transition` (strict,
/// errors on illegal moves) and `try_transition` (lenient, returns `None`
/// instead of erroring when the state has already moved past the attempted
/// target — e.g. a late webhook racing an expiry sweep) are built on.
pub fn validate(from: CheckoutState, target: CheckoutState) -> Result<TransitionOutcome, TransitionError> {
    if from == target {
        return Ok(TransitionOutcome::NoopSameState);
    }
    if from.is_terminal() {
        // BOOKED -> CANCELED is the one permitted post-terminal move.
        if from == CheckoutState::Booked && target == CheckoutState::Canceled {
            return Ok(TransitionOutcome::Applied);
        }
        return Err(TransitionError::InvalidTransition { from, target });
    }
    if allowed(from).contains(&target) {
        Ok(TransitionOutcome::Applied)
    } else {
        Err(TransitionError::InvalidTransition { from, target })
    }
}

/// Lenient variant used by racy callers (webhook handler, expiry sweep):
/// returns `Ok(None)` instead of an error when the move is illegal because
/// the checkout has already advanced past the attempted target. This is the
/// mechanism that lets a late `payment_intent.succeeded` lose gracefully to
/// an expiry sweep that already fired, and vice versa.
pub fn try_validate(from: CheckoutState, target: CheckoutState) -> Option<TransitionOutcome> {
    validate(from, target).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use CheckoutState::*;

    #[test]
    fn happy_path_graph_is_reachable() {
        assert_eq!(validate(Initiated, HoldCreated), Ok(TransitionOutcome::Applied));
        assert_eq!(validate(HoldCreated, PaymentCreated), Ok(TransitionOutcome::Applied));
        assert_eq!(validate(PaymentCreated, Paid), Ok(TransitionOutcome::Applied));
        assert_eq!(validate(Paid, Booked), Ok(TransitionOutcome::Applied));
    }

    #[test]
    fn same_state_is_noop_not_error() {
        assert_eq!(validate(HoldCreated, HoldCreated), Ok(TransitionOutcome::NoopSameState));
    }

    #[test]
    fn terminal_states_are_sinks() {
        for s in [Canceled, Expired, Failed] {
            assert!(validate(s, HoldCreated).is_err());
        }
    }

    #[test]
    fn booked_to_canceled_is_the_one_exception() {
        assert_eq!(validate(Booked, Canceled), Ok(TransitionOutcome::Applied));
        assert!(validate(Booked, Failed).is_err());
        assert!(validate(Booked, Paid).is_err());
    }

    #[test]
    fn paid_cannot_expire() {
        // PAID -> EXPIRED is not in the graph: a webhook that reaches PAID
        // can never be raced back into EXPIRED by the sweeper.
        assert!(validate(Paid, Expired).is_err());
    }

    #[test]
    fn late_webhook_after_expiry_loses_gracefully() {
        // try_validate must not panic or error loudly; it reports None.
        assert_eq!(try_validate(Expired, Paid), None);
    }

    #[test]
    fn expirable_states_match_sweep_scope() {
        assert!(HoldCreated.is_expirable());
        assert!(PaymentCreated.is_expirable());
        assert!(!Initiated.is_expirable());
        assert!(!Booked.is_expirable());
    }

    #[test]
    fn state_round_trips_through_str() {
        for s in [
            Initiated,
            HoldCreated,
            PaymentCreated,
            Paid,
            Booked,
            Canceled,
            Expired,
            Failed,
        ] {
            assert_eq!(CheckoutState::parse(s.as_str()), Some(s));
        }
    }
}
