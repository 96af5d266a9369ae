//! Integration tests for checkout and webhook reconciliation.
//!
//! These tests drive the billing services the way production does: checkout
//! calls the `process_*` operations while processor notifications arrive
//! through the webhook reconciler, in any order and possibly twice.
//!
//! Uses the mock gateway and in-memory ledgers; no network.

use std::sync::Arc;

use rust_decimal_macros::dec;
use serde_json::{json, Map};

use billing_reconciler::adapters::notifications::RecordingNotificationDispatcher;
use billing_reconciler::adapters::storage::{
    InMemoryCatalog, InMemorySubscriptionLedger, InMemoryTransactionLedger,
};
use billing_reconciler::adapters::stripe::{mock_card, MockPaymentGateway};
use billing_reconciler::application::{
    BillingContext, BillingSettings, CancelOptions, PaymentProcessor, ReconcileOutcome,
    SubscriptionLifecycleManager, WebhookReconciler,
};
use billing_reconciler::domain::billing::{
    BillingInterval, BillingPeriod, ChangeKind, PaymentDetails, Product, ProductGroup,
    RecordOutcome, Subscription, SubscriptionStatus, Transaction, TransactionStatus,
};
use billing_reconciler::domain::foundation::{ProductId, UserId};
use billing_reconciler::ports::{
    CatalogReader, Charge, Member, NoticeKind, SubscriptionLedger, TransactionLedger,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Fixture {
    gateway: MockPaymentGateway,
    transactions: InMemoryTransactionLedger,
    subscriptions: InMemorySubscriptionLedger,
    catalog: InMemoryCatalog,
    notifier: RecordingNotificationDispatcher,
    lifecycle: Arc<SubscriptionLifecycleManager>,
    processor: Arc<PaymentProcessor>,
    reconciler: WebhookReconciler,
}

impl Fixture {
    async fn new() -> Self {
        let gateway = MockPaymentGateway::new();
        let transactions = InMemoryTransactionLedger::new();
        let subscriptions = InMemorySubscriptionLedger::new();
        let catalog = InMemoryCatalog::new();
        let notifier = RecordingNotificationDispatcher::new();

        catalog
            .add_member(Member {
                user_id: user(),
                email: "grace@example.com".to_string(),
                full_name: "Grace Hopper".to_string(),
            })
            .await;
        let monthly = BillingPeriod::Recurring {
            interval: BillingInterval::Month,
            count: 1,
        };
        catalog.add_product(product("basic", 1, monthly)).await;
        catalog.add_product(product("pro", 2, monthly)).await;
        catalog.add_product(product("forever", 3, BillingPeriod::Lifetime)).await;

        let ctx = BillingContext::new(
            Arc::new(gateway.clone()),
            Arc::new(transactions.clone()),
            Arc::new(subscriptions.clone()),
            Arc::new(catalog.clone()),
            Arc::new(notifier.clone()),
            BillingSettings::default(),
        );
        let lifecycle = Arc::new(SubscriptionLifecycleManager::new(ctx.clone()));
        let processor = Arc::new(PaymentProcessor::new(ctx, lifecycle.clone()));
        let reconciler = WebhookReconciler::new(
            Arc::new(gateway.clone()),
            processor.clone(),
            lifecycle.clone(),
        );

        Self {
            gateway,
            transactions,
            subscriptions,
            catalog,
            notifier,
            lifecycle,
            processor,
            reconciler,
        }
    }

    async fn checkout_transaction(&self, product_id: &str) -> Transaction {
        let product = self.product(product_id).await;
        let txn = Transaction::pending(user(), product.id, product.price);
        self.transactions.store(&txn).await.unwrap();
        txn
    }

    async fn checkout_subscription(&self, product_id: &str) -> (Subscription, Transaction) {
        let product = self.product(product_id).await;
        let sub = Subscription::new(
            user(),
            product.id.clone(),
            product.price,
            BillingInterval::Month,
            1,
        );
        self.subscriptions.store(&sub).await.unwrap();
        let txn = Transaction::pending(user(), product.id, product.price).for_subscription(sub.id);
        self.transactions.store(&txn).await.unwrap();
        (sub, txn)
    }

    /// Runs the full signup flow and returns the processor customer id.
    async fn signup(&self, product_id: &str) -> (Subscription, String) {
        let (sub, txn) = self.checkout_subscription(product_id).await;
        self.lifecycle
            .process_create_subscription(&txn.id, &PaymentDetails::with_token("tok_visa"))
            .await
            .unwrap();
        let sub = self.subscriptions.load_by_id(&sub.id).await.unwrap().unwrap();
        let customer_id = sub.external_id.clone().unwrap();
        (sub, customer_id)
    }

    async fn product(&self, id: &str) -> Product {
        self.catalog
            .load_product(&ProductId::new(id).unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    async fn complete_count(&self) -> usize {
        self.transactions
            .all()
            .await
            .iter()
            .filter(|t| t.status == TransactionStatus::Complete)
            .count()
    }

    fn webhook(&self, event_id: &str, event_type: &str, object: serde_json::Value) -> Vec<u8> {
        self.gateway.add_event(event_id, event_type, object);
        json!({ "id": event_id }).to_string().into_bytes()
    }
}

fn user() -> UserId {
    UserId::new("member-42").unwrap()
}

fn product(id: &str, rank: u32, period: BillingPeriod) -> Product {
    Product {
        id: ProductId::new(id).unwrap(),
        name: id.to_string(),
        price: dec!(15.00),
        period,
        group: Some(ProductGroup {
            id: "plans".to_string(),
            rank,
        }),
    }
}

fn recurring_charge(id: &str, customer: &str) -> Charge {
    Charge {
        id: id.to_string(),
        amount: 1500,
        currency: Some("usd".to_string()),
        customer: Some(customer.to_string()),
        description: None,
        source: Some(mock_card()),
        card: None,
        extra: Map::new(),
    }
}

/// Charge as checkout creates it: described, paid with a token.
fn checkout_charge(id: &str, txn: &Transaction) -> Charge {
    Charge {
        id: id.to_string(),
        amount: 1500,
        currency: Some("usd".to_string()),
        customer: None,
        description: Some(format!("{} (transaction: {})", txn.product_id, txn.id)),
        source: Some(mock_card()),
        card: None,
        extra: Map::new(),
    }
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn completing_twice_with_same_charge_yields_one_complete_and_one_receipt() {
    let f = Fixture::new().await;
    let txn = f.checkout_transaction("forever").await;

    let outcome = f
        .processor
        .process_payment(&txn.id, &PaymentDetails::with_token("tok_visa"))
        .await
        .unwrap();
    let charge_id = outcome.applied().unwrap().external_id.unwrap();
    let mut charge = recurring_charge(&charge_id, "unused");
    charge.customer = None;

    let again = f.processor.record_payment(&charge).await.unwrap();

    assert_eq!(again, RecordOutcome::AlreadyApplied);
    assert_eq!(f.complete_count().await, 1);
    assert_eq!(f.notifier.count(NoticeKind::Receipt), 1);
}

#[tokio::test]
async fn redelivered_renewal_webhook_records_one_payment() {
    let f = Fixture::new().await;
    let (_, customer_id) = f.signup("basic").await;
    let body = f.webhook(
        "evt_renewal",
        "charge.succeeded",
        json!({ "id": "ch_renewal", "amount": 1500, "customer": customer_id }),
    );

    let first = f.reconciler.handle(&body).await.unwrap();
    let second = f.reconciler.handle(&body).await.unwrap();

    assert!(matches!(first, ReconcileOutcome::Recorded { applied: true, .. }));
    assert!(matches!(second, ReconcileOutcome::Recorded { applied: false, .. }));
    assert_eq!(f.complete_count().await, 1);
}

// =============================================================================
// Race tolerance
// =============================================================================

#[tokio::test]
async fn checkout_then_webhook_for_same_charge_records_once() {
    let f = Fixture::new().await;
    let (sub, customer_id) = f.signup("basic").await;
    let charge = recurring_charge("ch_cycle_1", &customer_id);

    let checkout = f.processor.record_subscription_payment(&charge).await.unwrap();
    let webhook = f
        .reconciler
        .handle(&f.webhook(
            "evt_1",
            "charge.succeeded",
            serde_json::to_value(&charge).unwrap(),
        ))
        .await
        .unwrap();

    assert!(checkout.is_applied());
    assert!(matches!(webhook, ReconcileOutcome::Recorded { applied: false, .. }));
    let rows = f.transactions.all().await;
    assert_eq!(
        rows.iter()
            .filter(|t| t.external_id.as_deref() == Some("ch_cycle_1"))
            .count(),
        1
    );
    assert_eq!(rows.last().unwrap().subscription_id, Some(sub.id));
}

#[tokio::test]
async fn webhook_then_checkout_for_same_charge_records_once() {
    let f = Fixture::new().await;
    let (_, customer_id) = f.signup("basic").await;
    let charge = recurring_charge("ch_cycle_1", &customer_id);

    let webhook = f
        .reconciler
        .handle(&f.webhook(
            "evt_1",
            "charge.succeeded",
            serde_json::to_value(&charge).unwrap(),
        ))
        .await
        .unwrap();
    let checkout = f.processor.record_subscription_payment(&charge).await.unwrap();

    assert!(matches!(webhook, ReconcileOutcome::Recorded { applied: true, .. }));
    assert_eq!(checkout, RecordOutcome::AlreadyApplied);
    assert_eq!(f.complete_count().await, 1);
}

#[tokio::test]
async fn checkout_payment_then_its_webhook_records_once() {
    let f = Fixture::new().await;
    let txn = f.checkout_transaction("forever").await;
    f.gateway.set_next_charge(checkout_charge("ch_checkout", &txn));

    let checkout = f
        .processor
        .process_payment(&txn.id, &PaymentDetails::with_token("tok_visa"))
        .await
        .unwrap();
    let webhook = f
        .reconciler
        .handle(&f.webhook(
            "evt_checkout",
            "charge.succeeded",
            serde_json::to_value(checkout_charge("ch_checkout", &txn)).unwrap(),
        ))
        .await
        .unwrap();

    assert!(checkout.is_applied());
    assert!(matches!(webhook, ReconcileOutcome::Ignored { .. }));
    assert_eq!(f.complete_count().await, 1);
    assert_eq!(f.notifier.count(NoticeKind::Receipt), 1);
}

#[tokio::test]
async fn webhook_before_checkout_payment_records_once() {
    let f = Fixture::new().await;
    let txn = f.checkout_transaction("forever").await;
    f.gateway.set_next_charge(checkout_charge("ch_checkout", &txn));

    let webhook = f
        .reconciler
        .handle(&f.webhook(
            "evt_checkout",
            "charge.succeeded",
            serde_json::to_value(checkout_charge("ch_checkout", &txn)).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(f.complete_count().await, 0);

    let checkout = f
        .processor
        .process_payment(&txn.id, &PaymentDetails::with_token("tok_visa"))
        .await
        .unwrap();

    assert!(matches!(webhook, ReconcileOutcome::Ignored { .. }));
    assert!(checkout.is_applied());
    assert_eq!(f.complete_count().await, 1);
    assert_eq!(f.notifier.count(NoticeKind::Receipt), 1);
}

#[tokio::test]
async fn checkout_payment_racing_its_webhook_records_once() {
    let f = Fixture::new().await;
    let txn = f.checkout_transaction("forever").await;
    f.gateway.set_next_charge(checkout_charge("ch_checkout", &txn));
    let body = f.webhook(
        "evt_checkout",
        "charge.succeeded",
        serde_json::to_value(checkout_charge("ch_checkout", &txn)).unwrap(),
    );
    let details = PaymentDetails::with_token("tok_visa");

    let (checkout, webhook) = tokio::join!(
        f.processor.process_payment(&txn.id, &details),
        f.reconciler.handle(&body),
    );

    assert!(checkout.unwrap().is_applied());
    assert!(matches!(webhook.unwrap(), ReconcileOutcome::Ignored { .. }));
    assert_eq!(f.complete_count().await, 1);
    assert_eq!(f.notifier.count(NoticeKind::Receipt), 1);
}

#[tokio::test]
async fn concurrent_deliveries_of_same_charge_record_once() {
    let f = Fixture::new().await;
    let (_, customer_id) = f.signup("basic").await;
    let charge = recurring_charge("ch_cycle_1", &customer_id);

    let (a, b) = tokio::join!(
        f.processor.record_subscription_payment(&charge),
        f.processor.record_subscription_payment(&charge),
    );

    let applied = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| o.is_applied())
        .count();
    assert_eq!(applied, 1);
    assert_eq!(f.complete_count().await, 1);
}

#[tokio::test]
async fn concurrent_completion_of_one_checkout_leaves_one_complete_row() {
    let f = Fixture::new().await;
    let mut txn = f.checkout_transaction("forever").await;
    txn.external_id = Some("ch_once".to_string());
    f.transactions.store(&txn).await.unwrap();
    let mut charge = recurring_charge("ch_once", "unused");
    charge.customer = None;

    let (a, b) = tokio::join!(
        f.processor.record_payment(&charge),
        f.processor.record_payment(&charge),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(f.transactions.count().await, 1);
    assert_eq!(f.complete_count().await, 1);
}

// =============================================================================
// Classification ordering
// =============================================================================

#[tokio::test]
async fn classifying_after_cancelling_prior_would_misreport_upgrade() {
    let f = Fixture::new().await;
    let (basic, _) = f.signup("basic").await;
    let pro = f.product("pro").await;

    let before = f.lifecycle.find_prior(&user(), &pro, None).await.unwrap();
    let correct = ChangeKind::classify(&pro, before.as_ref().map(|(_, p)| p));

    f.lifecycle
        .process_cancel_subscription(&basic.id, CancelOptions::silent())
        .await
        .unwrap();
    let after = f.lifecycle.find_prior(&user(), &pro, None).await.unwrap();
    let wrong = ChangeKind::classify(&pro, after.as_ref().map(|(_, p)| p));

    assert_eq!(correct, ChangeKind::Upgrade);
    assert_eq!(wrong, ChangeKind::New);
}

#[tokio::test]
async fn signup_for_higher_rank_reports_upgrade_and_retires_prior() {
    let f = Fixture::new().await;
    let (basic, _) = f.signup("basic").await;
    f.notifier.clear();

    f.signup("pro").await;

    assert_eq!(f.notifier.count(NoticeKind::Upgraded), 1);
    assert_eq!(f.notifier.count(NoticeKind::NewSubscription), 0);
    let basic = f.subscriptions.load_by_id(&basic.id).await.unwrap().unwrap();
    assert_eq!(basic.status, SubscriptionStatus::Cancelled);
}

// =============================================================================
// Suspend, resume, cancel
// =============================================================================

#[tokio::test]
async fn suspended_subscription_resumes_and_cancelled_one_does_not() {
    let f = Fixture::new().await;
    let (sub, _) = f.signup("basic").await;

    f.lifecycle.process_suspend_subscription(&sub.id).await.unwrap();
    let resumed = f.lifecycle.process_resume_subscription(&sub.id).await.unwrap();
    assert_eq!(
        resumed.applied().unwrap().status,
        SubscriptionStatus::Active
    );

    f.lifecycle
        .process_cancel_subscription(&sub.id, CancelOptions::default())
        .await
        .unwrap();
    assert!(f.lifecycle.process_resume_subscription(&sub.id).await.is_err());

    assert_eq!(f.gateway.call_count("delete_subscription"), 2);
    assert_eq!(f.gateway.call_count("resume_subscription"), 1);
}

#[tokio::test]
async fn deletion_webhook_after_suspend_keeps_subscription_resumable() {
    let f = Fixture::new().await;
    let (sub, customer_id) = f.signup("basic").await;
    f.lifecycle.process_suspend_subscription(&sub.id).await.unwrap();

    let outcome = f
        .reconciler
        .handle(&f.webhook(
            "evt_deleted",
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "customer": customer_id, "status": "canceled" }),
        ))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Recorded { applied: false, .. }));
    let sub = f.subscriptions.load_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Suspended);
}

#[tokio::test]
async fn failed_renewal_cuts_access_until_next_success() {
    let f = Fixture::new().await;
    let (sub, customer_id) = f.signup("basic").await;

    f.reconciler
        .handle(&f.webhook(
            "evt_failed",
            "charge.failed",
            json!({ "id": "ch_declined", "amount": 1500, "customer": customer_id }),
        ))
        .await
        .unwrap();

    let now = billing_reconciler::domain::foundation::Timestamp::now();
    let rows = f.transactions.all().await;
    assert!(rows.iter().all(|t| !t.grants_access_at(&now)));

    f.reconciler
        .handle(&f.webhook(
            "evt_paid",
            "charge.succeeded",
            json!({ "id": "ch_retry", "amount": 1500, "customer": customer_id }),
        ))
        .await
        .unwrap();

    let rows = f.transactions.all().await;
    let paid = rows
        .iter()
        .find(|t| t.external_id.as_deref() == Some("ch_retry"))
        .unwrap();
    assert!(paid.grants_access_at(&now));
    assert_eq!(paid.subscription_id, Some(sub.id));
}
