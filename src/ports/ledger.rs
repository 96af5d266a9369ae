//! Ledger ports for transactions and subscriptions.
//!
//! Both ledgers are record stores with load/store semantics. `store` is an
//! atomic upsert of the whole record; no partially-applied field updates are
//! ever visible to readers.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{BillingError, Subscription, Transaction, TransactionStatus};
use crate::domain::foundation::{SubscriptionId, TransactionId, UserId};

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn load_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, LedgerError>;

    /// Finds the transaction holding a processor reference (charge or
    /// customer id).
    async fn load_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Atomic upsert.
    ///
    /// Fails with `DuplicateExternalId` if another transaction already holds
    /// the same processor reference, whatever its status.
    async fn store(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Upsert guarded by the stored status.
    ///
    /// Writes only while the stored row is still in `expected` status and
    /// returns `false` without writing otherwise. Status transitions go
    /// through here so that only one concurrent writer applies them.
    async fn store_if_status(
        &self,
        transaction: &Transaction,
        expected: TransactionStatus,
    ) -> Result<bool, LedgerError>;

    /// All transactions of a subscription, oldest first.
    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Transaction>, LedgerError>;
}

#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    async fn load_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, LedgerError>;

    /// Finds the subscription for a processor customer id.
    ///
    /// Prefers the newest record that is not cancelled.
    async fn load_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, LedgerError>;

    /// Atomic upsert.
    async fn store(&self, subscription: &Subscription) -> Result<(), LedgerError>;

    /// All subscriptions of a member, oldest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Subscription>, LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("processor reference {0} already recorded")]
    DuplicateExternalId(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for BillingError {
    fn from(err: LedgerError) -> Self {
        BillingError::Storage(err.to_string())
    }
}
