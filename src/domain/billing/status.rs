//! Ledger status state machines.
//!
//! Transactions and subscriptions only ever move forward. Idempotent
//! re-delivery is handled by callers checking the current status before
//! attempting a transition, never by allowing backwards edges here.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Status of a single ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created at checkout, no processor result yet.
    Pending,

    /// Charge captured by the processor.
    Complete,

    /// Charge declined or failed.
    Failed,

    /// Charge returned to the payer.
    Refunded,

    /// Zero-amount placeholder granting access through a trial or grace window.
    Confirmed,
}

impl TransactionStatus {
    /// Statuses that grant access while unexpired.
    pub fn grants_access(&self) -> bool {
        matches!(self, TransactionStatus::Complete | TransactionStatus::Confirmed)
    }
}

impl StateMachine for TransactionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, target),
            (Pending, Complete)
                | (Pending, Failed)
                | (Pending, Confirmed)
                | (Complete, Refunded)
                // A later real charge produces a new transaction instead.
                | (Confirmed, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TransactionStatus::*;
        match self {
            Pending => vec![Complete, Failed, Confirmed],
            Complete => vec![Refunded],
            Confirmed => vec![Failed],
            Failed | Refunded => vec![],
        }
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    SubscriptionConfirmation,
}

/// Status of a local subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created at checkout, processor subscription not yet confirmed.
    Pending,

    /// Billing normally.
    Active,

    /// Billing stopped at the processor, resumable.
    Suspended,

    /// Billing stopped for good. Resubscribing creates a new record.
    Cancelled,
}

impl SubscriptionStatus {
    /// Statuses that still belong to a live billing relationship.
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Suspended)
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active)
                | (Active, Active) // Renewal
                | (Active, Suspended)
                | (Active, Cancelled)
                | (Suspended, Active)
                | (Suspended, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active],
            Active => vec![Active, Suspended, Cancelled],
            Suspended => vec![Active, Cancelled],
            Cancelled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Transaction transitions

    #[test]
    fn pending_transaction_can_complete_fail_or_confirm() {
        let status = TransactionStatus::Pending;
        assert!(status.can_transition_to(&TransactionStatus::Complete));
        assert!(status.can_transition_to(&TransactionStatus::Failed));
        assert!(status.can_transition_to(&TransactionStatus::Confirmed));
    }

    #[test]
    fn confirmed_transaction_never_completes_directly() {
        let result = TransactionStatus::Confirmed.transition_to(TransactionStatus::Complete);
        assert!(result.is_err());
        assert_eq!(
            TransactionStatus::Confirmed.transition_to(TransactionStatus::Failed),
            Ok(TransactionStatus::Failed)
        );
    }

    #[test]
    fn complete_transaction_only_refunds() {
        assert_eq!(
            TransactionStatus::Complete.valid_transitions(),
            vec![TransactionStatus::Refunded]
        );
    }

    #[test]
    fn failed_and_refunded_are_terminal() {
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Refunded.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn only_complete_and_confirmed_grant_access() {
        assert!(TransactionStatus::Complete.grants_access());
        assert!(TransactionStatus::Confirmed.grants_access());
        assert!(!TransactionStatus::Pending.grants_access());
        assert!(!TransactionStatus::Refunded.grants_access());
    }

    // Subscription transitions

    #[test]
    fn suspended_is_resumable_but_cancelled_is_terminal() {
        assert!(SubscriptionStatus::Suspended.can_transition_to(&SubscriptionStatus::Active));
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(!SubscriptionStatus::Suspended.is_terminal());
    }

    #[test]
    fn active_renewal_is_allowed() {
        assert_eq!(
            SubscriptionStatus::Active.transition_to(SubscriptionStatus::Active),
            Ok(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn pending_subscription_cannot_be_suspended() {
        assert!(SubscriptionStatus::Pending
            .transition_to(SubscriptionStatus::Suspended)
            .is_err());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        use SubscriptionStatus::*;
        for status in [Pending, Active, Suspended, Cancelled] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target), "{:?} -> {:?}", status, target);
            }
        }
        use TransactionStatus as T;
        for status in [T::Pending, T::Complete, T::Failed, T::Refunded, T::Confirmed] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target), "{:?} -> {:?}", status, target);
            }
        }
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionType::SubscriptionConfirmation).unwrap(),
            "\"subscription_confirmation\""
        );
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
