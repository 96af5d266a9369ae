//! Fixtures shared by the billing service tests.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Map;

use crate::adapters::notifications::RecordingNotificationDispatcher;
use crate::adapters::storage::{
    InMemoryCatalog, InMemorySubscriptionLedger, InMemoryTransactionLedger,
};
use crate::adapters::stripe::{mock_card, MockPaymentGateway};
use crate::domain::billing::{
    BillingInterval, BillingPeriod, Product, ProductGroup, Subscription, SubscriptionStatus,
    Transaction, TransactionStatus,
};
use crate::domain::foundation::{ProductId, SubscriptionId, Timestamp, TransactionId, UserId};
use crate::ports::{
    CardList, Charge, Customer, LedgerError, Member, SubscriptionLedger, TransactionLedger,
};

use super::{
    BillingContext, BillingSettings, PaymentProcessor, SubscriptionLifecycleManager,
    WebhookReconciler,
};

pub(crate) const USER: &str = "user-1";

pub(crate) struct Harness {
    pub gateway: MockPaymentGateway,
    pub transactions: InMemoryTransactionLedger,
    pub subscriptions: InMemorySubscriptionLedger,
    pub catalog: InMemoryCatalog,
    pub notifier: RecordingNotificationDispatcher,
    pub ctx: BillingContext,
}

impl Harness {
    /// One member and a small catalog:
    /// `silver` (10/month, tiers rank 1), `gold` (20/month, tiers rank 2),
    /// `platinum` (300 lifetime, tiers rank 3), `course` (99 lifetime, no group)
    /// and `course-monthly` (5/month, no group).
    ///
    /// The services see transactions through an [`InterleavingLedger`].
    pub async fn new() -> Self {
        let gateway = MockPaymentGateway::new();
        let transactions = InMemoryTransactionLedger::new();
        let subscriptions = InMemorySubscriptionLedger::new();
        let catalog = InMemoryCatalog::new();
        let notifier = RecordingNotificationDispatcher::new();

        catalog
            .add_member(Member {
                user_id: user(),
                email: "ada@example.com".to_string(),
                full_name: "Ada Lovelace".to_string(),
            })
            .await;
        catalog.add_product(monthly("silver", dec!(10), Some(1))).await;
        catalog.add_product(monthly("gold", dec!(20), Some(2))).await;
        catalog.add_product(monthly("course-monthly", dec!(5), None)).await;
        catalog.add_product(lifetime("platinum", dec!(300), Some(3))).await;
        catalog.add_product(lifetime("course", dec!(99), None)).await;

        let settings = BillingSettings {
            site_host: "localhost".to_string(),
            site_name: "A Very Long Membership Site".to_string(),
            ..BillingSettings::default()
        };

        let ctx = BillingContext::new(
            Arc::new(gateway.clone()),
            Arc::new(InterleavingLedger(transactions.clone())),
            Arc::new(subscriptions.clone()),
            Arc::new(catalog.clone()),
            Arc::new(notifier.clone()),
            settings,
        );

        Self {
            gateway,
            transactions,
            subscriptions,
            catalog,
            notifier,
            ctx,
        }
    }

    pub fn lifecycle(&self) -> Arc<SubscriptionLifecycleManager> {
        Arc::new(SubscriptionLifecycleManager::new(self.ctx.clone()))
    }

    pub fn processor(&self) -> Arc<PaymentProcessor> {
        Arc::new(PaymentProcessor::new(self.ctx.clone(), self.lifecycle()))
    }

    pub fn reconciler(&self) -> WebhookReconciler {
        let lifecycle = self.lifecycle();
        let processor = Arc::new(PaymentProcessor::new(self.ctx.clone(), lifecycle.clone()));
        WebhookReconciler::new(self.ctx.gateway.clone(), processor, lifecycle)
    }

    /// Pending one-off purchase at the product's price.
    pub async fn pending_txn(&self, product: &str) -> Transaction {
        let price = self.price(product).await;
        let txn = Transaction::pending(user(), product_id(product), price);
        self.transactions.store(&txn).await.unwrap();
        txn
    }

    /// Pending subscription plus its pending checkout transaction.
    pub async fn pending_subscription(&self, product: &str) -> (Subscription, Transaction) {
        let price = self.price(product).await;
        let sub = Subscription::new(user(), product_id(product), price, BillingInterval::Month, 1);
        self.subscriptions.store(&sub).await.unwrap();

        let txn = Transaction::pending(user(), product_id(product), price).for_subscription(sub.id);
        self.transactions.store(&txn).await.unwrap();
        (sub, txn)
    }

    /// Active subscription billed to `customer_id`, with one completed payment
    /// granting access for thirty more days. The customer exists at the mock
    /// processor with the default mock card.
    pub async fn active_subscription(
        &self,
        product: &str,
        customer_id: &str,
    ) -> (Subscription, Transaction) {
        let price = self.price(product).await;
        let mut sub =
            Subscription::new(user(), product_id(product), price, BillingInterval::Month, 1);
        sub.external_id = Some(customer_id.to_string());
        sub.status = SubscriptionStatus::Active;
        self.subscriptions.store(&sub).await.unwrap();

        let mut txn = Transaction::pending(user(), product_id(product), price)
            .for_subscription(sub.id)
            .expiring_at(Some(Timestamp::now().add_days(30)));
        txn.external_id = Some(format!("ch_{}", customer_id));
        txn.status = TransactionStatus::Complete;
        self.transactions.store(&txn).await.unwrap();

        self.gateway.add_customer(customer(customer_id));
        (sub, txn)
    }

    async fn price(&self, product: &str) -> Decimal {
        self.ctx.product(&product_id(product)).await.unwrap().price
    }
}

/// Transaction ledger that yields right after each lookup by processor
/// reference. Two operations joined in one test then both read before either
/// writes.
#[derive(Clone)]
pub(crate) struct InterleavingLedger(pub InMemoryTransactionLedger);

#[async_trait]
impl TransactionLedger for InterleavingLedger {
    async fn load_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.0.load_by_id(id).await
    }

    async fn load_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        let found = self.0.load_by_external_id(external_id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn store(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.0.store(transaction).await
    }

    async fn store_if_status(
        &self,
        transaction: &Transaction,
        expected: TransactionStatus,
    ) -> Result<bool, LedgerError> {
        self.0.store_if_status(transaction, expected).await
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.0.list_for_subscription(subscription_id).await
    }
}

pub(crate) fn user() -> UserId {
    UserId::new(USER).unwrap()
}

pub(crate) fn product_id(id: &str) -> ProductId {
    ProductId::new(id).unwrap()
}

/// Processor customer carrying the default mock card.
pub(crate) fn customer(id: &str) -> Customer {
    let card = mock_card();
    Customer {
        id: id.to_string(),
        email: Some("ada@example.com".to_string()),
        default_source: card.id.clone(),
        sources: Some(CardList { data: vec![card] }),
        default_card: None,
        cards: None,
        active_card: None,
        extra: Map::new(),
    }
}

/// Charge as the processor reports it in a webhook, paid with the mock card.
pub(crate) fn charge(id: &str, customer: Option<&str>, amount: i64) -> Charge {
    Charge {
        id: id.to_string(),
        amount,
        currency: Some("usd".to_string()),
        customer: customer.map(str::to_string),
        description: None,
        source: Some(mock_card()),
        card: None,
        extra: Map::new(),
    }
}

fn group(rank: Option<u32>) -> Option<ProductGroup> {
    rank.map(|rank| ProductGroup {
        id: "tiers".to_string(),
        rank,
    })
}

fn monthly(id: &str, price: Decimal, rank: Option<u32>) -> Product {
    Product {
        id: product_id(id),
        name: id.to_string(),
        price,
        period: BillingPeriod::Recurring {
            interval: BillingInterval::Month,
            count: 1,
        },
        group: group(rank),
    }
}

fn lifetime(id: &str, price: Decimal, rank: Option<u32>) -> Product {
    Product {
        id: product_id(id),
        name: id.to_string(),
        price,
        period: BillingPeriod::Lifetime,
        group: group(rank),
    }
}
