//! In-Memory Ledger Adapters
//!
//! Stores transactions and subscriptions in memory.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{Subscription, SubscriptionStatus, Transaction, TransactionStatus};
use crate::domain::foundation::{SubscriptionId, TransactionId, UserId};
use crate::ports::{LedgerError, SubscriptionLedger, TransactionLedger};

/// In-memory transaction ledger.
///
/// Enforces that at most one transaction holds a given processor reference.
/// Every check and its write happen under one write lock.
#[derive(Debug, Clone)]
pub struct InMemoryTransactionLedger {
    rows: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionLedger {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Every stored transaction, oldest first.
    pub async fn all(&self) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }
}

impl Default for InMemoryTransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionLedger for InMemoryTransactionLedger {
    async fn load_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn load_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn store(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let mut rows = self.rows.write().await;
        ensure_reference_free(&rows, transaction)?;
        rows.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn store_if_status(
        &self,
        transaction: &Transaction,
        expected: TransactionStatus,
    ) -> Result<bool, LedgerError> {
        let mut rows = self.rows.write().await;
        let current = rows.get(&transaction.id).map(|t| t.status);
        if current != Some(expected) {
            return Ok(false);
        }
        ensure_reference_free(&rows, transaction)?;
        rows.insert(transaction.id, transaction.clone());
        Ok(true)
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Transaction> = rows
            .values()
            .filter(|t| t.subscription_id.as_ref() == Some(subscription_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

fn ensure_reference_free(
    rows: &HashMap<TransactionId, Transaction>,
    transaction: &Transaction,
) -> Result<(), LedgerError> {
    let Some(external_id) = transaction.external_id.as_deref() else {
        return Ok(());
    };
    let taken = rows
        .values()
        .any(|t| t.id != transaction.id && t.external_id.as_deref() == Some(external_id));
    if taken {
        return Err(LedgerError::DuplicateExternalId(external_id.to_string()));
    }
    Ok(())
}

/// In-memory subscription ledger.
#[derive(Debug, Clone)]
pub struct InMemorySubscriptionLedger {
    rows: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionLedger {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl Default for InMemorySubscriptionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionLedger for InMemorySubscriptionLedger {
    async fn load_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, LedgerError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn load_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, LedgerError> {
        let rows = self.rows.read().await;
        let mut matches: Vec<&Subscription> = rows
            .values()
            .filter(|s| s.external_id.as_deref() == Some(external_id))
            .collect();

        matches.sort_by(|a, b| {
            let a_cancelled = a.status == SubscriptionStatus::Cancelled;
            let b_cancelled = b.status == SubscriptionStatus::Cancelled;
            a_cancelled
                .cmp(&b_cancelled)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(matches.first().map(|s| (*s).clone()))
    }

    async fn store(&self, subscription: &Subscription) -> Result<(), LedgerError> {
        self.rows
            .write()
            .await
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Subscription>, LedgerError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Subscription> = rows
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}
