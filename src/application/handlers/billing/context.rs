//! Collaborators and settings shared by the billing services.

use std::sync::Arc;

use crate::config::BillingConfig;
use crate::domain::billing::{
    BillingError, CardSummary, CurrencyCodec, Product, Subscription, Transaction,
};
use crate::domain::foundation::{ProductId, SubscriptionId, TransactionId, UserId};
use crate::ports::{
    CatalogReader, Member, Notice, NoticeKind, NotificationDispatcher, PaymentGateway,
    SubscriptionLedger, TransactionLedger,
};

/// Ledger policy values the services read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSettings {
    pub codec: CurrencyCodec,
    pub site_host: String,
    pub site_name: String,
    pub grace_init_days: u32,
    pub resume_confirmation_days: u32,
}

impl From<&BillingConfig> for BillingSettings {
    fn from(config: &BillingConfig) -> Self {
        Self {
            codec: CurrencyCodec::new(config.currency_code.clone()),
            site_host: config.site_host.clone(),
            site_name: config.site_name.clone(),
            grace_init_days: config.grace_init_days,
            resume_confirmation_days: config.resume_confirmation_days,
        }
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self::from(&BillingConfig::default())
    }
}

/// Ports and settings, cheap to clone.
#[derive(Clone)]
pub struct BillingContext {
    pub gateway: Arc<dyn PaymentGateway>,
    pub transactions: Arc<dyn TransactionLedger>,
    pub subscriptions: Arc<dyn SubscriptionLedger>,
    pub catalog: Arc<dyn CatalogReader>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub settings: BillingSettings,
}

impl BillingContext {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        transactions: Arc<dyn TransactionLedger>,
        subscriptions: Arc<dyn SubscriptionLedger>,
        catalog: Arc<dyn CatalogReader>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            gateway,
            transactions,
            subscriptions,
            catalog,
            notifier,
            settings,
        }
    }

    pub(crate) async fn product(&self, id: &ProductId) -> Result<Product, BillingError> {
        self.catalog
            .load_product(id)
            .await?
            .ok_or_else(|| BillingError::record_not_found("product", id))
    }

    pub(crate) async fn member(&self, id: &UserId) -> Result<Member, BillingError> {
        self.catalog
            .load_member(id)
            .await?
            .ok_or_else(|| BillingError::record_not_found("member", id))
    }

    pub(crate) async fn transaction(&self, id: &TransactionId) -> Result<Transaction, BillingError> {
        self.transactions
            .load_by_id(id)
            .await?
            .ok_or_else(|| BillingError::record_not_found("transaction", id))
    }

    pub(crate) async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Subscription, BillingError> {
        self.subscriptions
            .load_by_id(id)
            .await?
            .ok_or_else(|| BillingError::record_not_found("subscription", id))
    }

    pub(crate) async fn notify_transaction(&self, kind: NoticeKind, txn: &Transaction) {
        self.notifier
            .dispatch(Notice::for_transaction(kind, txn.user_id.clone(), txn.id))
            .await;
    }

    pub(crate) async fn notify_subscription(&self, kind: NoticeKind, sub: &Subscription) {
        self.notifier
            .dispatch(Notice::for_subscription(kind, sub.user_id.clone(), sub.id))
            .await;
    }

    /// Card-expiring notice when the card on file lapses before the access
    /// window the transaction grants.
    pub(crate) async fn notify_if_card_expiring(
        &self,
        txn: &Transaction,
        card: Option<&CardSummary>,
    ) {
        let (Some(card), Some(expires_at)) = (card, txn.expires_at.as_ref()) else {
            return;
        };
        if card.expires_before(expires_at) {
            self.notify_transaction(NoticeKind::CardExpiring, txn).await;
        }
    }
}
