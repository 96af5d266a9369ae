//! Ledger transaction entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{
    ProductId, StateMachine, SubscriptionId, Timestamp, TransactionId, UserId, ValidationError,
};

use super::{TransactionStatus, TransactionType};

/// One payment (or access-granting placeholder) on the ledger.
///
/// `external_id` holds the processor charge id once one exists. `amount` is
/// what was or will be charged; `gross` is the reporting figure, which differs
/// only for confirmation transactions that keep the original purchase price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub subscription_id: Option<SubscriptionId>,
    pub status: TransactionStatus,
    pub txn_type: TransactionType,
    pub external_id: Option<String>,
    pub amount: Decimal,
    pub gross: Decimal,
    pub coupon_id: Option<String>,
    pub response: Option<Value>,
    pub created_at: Timestamp,
    /// `None` means access never expires.
    pub expires_at: Option<Timestamp>,
}

impl Transaction {
    /// A pending payment created at checkout.
    pub fn pending(user_id: UserId, product_id: ProductId, amount: Decimal) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            product_id,
            subscription_id: None,
            status: TransactionStatus::Pending,
            txn_type: TransactionType::Payment,
            external_id: None,
            amount,
            gross: amount,
            coupon_id: None,
            response: None,
            created_at: Timestamp::now(),
            expires_at: None,
        }
    }

    pub fn for_subscription(mut self, subscription_id: SubscriptionId) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn expiring_at(mut self, expires_at: Option<Timestamp>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_coupon(mut self, coupon_id: Option<String>) -> Self {
        self.coupon_id = coupon_id;
        self
    }

    /// Moves to `target`, rejecting edges the status machine forbids.
    pub fn transition(&mut self, target: TransactionStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }

    /// Sets both charged and reporting amounts.
    pub fn set_amount(&mut self, amount: Decimal) {
        self.amount = amount;
        self.gross = amount;
    }

    /// True once the access window has closed.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        match &self.expires_at {
            Some(expires_at) => expires_at.is_before(now),
            None => false,
        }
    }

    /// True while this transaction grants access.
    pub fn grants_access_at(&self, now: &Timestamp) -> bool {
        self.status.grants_access() && !self.is_expired_at(now)
    }
}
