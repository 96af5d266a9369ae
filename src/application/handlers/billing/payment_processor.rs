//! PaymentProcessor - one-off charges, recurring-cycle charges, failures,
//! refunds and paid trials.
//!
//! Synchronous checkout calls `process_*`; webhook delivery lands on the
//! `record_*` methods. Both paths converge on the same idempotent
//! `record_*` logic.

use std::sync::Arc;

use crate::domain::billing::{
    BillingError, ChangeKind, CycleLimitAction, PaymentDetails, PaymentSource, RecordOutcome,
    Subscription, SubscriptionStatus, Transaction, TransactionStatus, TransactionType,
};
use crate::domain::foundation::{StateMachine, Timestamp, TransactionId};
use crate::ports::{Charge, ChargeRequest, LedgerError, NoticeKind};

use super::context::BillingContext;
use super::subscription_lifecycle::{CancelOptions, SubscriptionLifecycleManager};

pub struct PaymentProcessor {
    ctx: BillingContext,
    lifecycle: Arc<SubscriptionLifecycleManager>,
}

impl PaymentProcessor {
    pub fn new(ctx: BillingContext, lifecycle: Arc<SubscriptionLifecycleManager>) -> Self {
        Self { ctx, lifecycle }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // One-off payments
    // ════════════════════════════════════════════════════════════════════════════

    /// Charges a pending transaction and records the result.
    ///
    /// A transaction that is already paid is never charged again.
    pub async fn process_payment(
        &self,
        txn_id: &TransactionId,
        details: &PaymentDetails,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let source = details.charge_source()?;
        let mut txn = self.ctx.transaction(txn_id).await?;

        match txn.status {
            TransactionStatus::Pending => {}
            TransactionStatus::Complete | TransactionStatus::Refunded => {
                return Ok(RecordOutcome::AlreadyApplied)
            }
            other => {
                return Err(BillingError::InvalidTransition(format!(
                    "cannot charge a {:?} transaction",
                    other
                )))
            }
        }

        let charge = self
            .charge(&mut txn, source, details.client_ip.clone())
            .await?;
        self.record_payment(&charge).await
    }

    /// Finalizes the transaction a charge was made for.
    ///
    /// The superseded subscription is cancelled before the transaction is
    /// completed, so a failed cancel leaves the transaction pending for the
    /// next attempt.
    pub async fn record_payment(
        &self,
        charge: &Charge,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let Some(mut txn) = self.ctx.transactions.load_by_external_id(&charge.id).await? else {
            tracing::warn!(charge_id = %charge.id, "No transaction for charge");
            return Ok(RecordOutcome::NoMatch);
        };
        if matches!(
            txn.status,
            TransactionStatus::Complete | TransactionStatus::Refunded
        ) {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        let loaded_status = txn.status;
        txn.transition(TransactionStatus::Complete)?;
        txn.response = Some(charge.to_value());

        // Classification reads the prior subscription, so it must run before
        // the prior is cancelled.
        let product = self.ctx.product(&txn.product_id).await?;
        let prior = self
            .lifecycle
            .find_prior(&txn.user_id, &product, txn.subscription_id)
            .await?;
        let change = ChangeKind::classify(&product, prior.as_ref().map(|(_, p)| p));

        if let Some((prior_sub, _)) = prior {
            self.lifecycle.cancel_superseded(prior_sub).await?;
        }

        if !self
            .ctx
            .transactions
            .store_if_status(&txn, loaded_status)
            .await?
        {
            tracing::debug!(txn_id = %txn.id, charge_id = %charge.id, "Payment recorded concurrently");
            return Ok(RecordOutcome::AlreadyApplied);
        }

        tracing::info!(
            txn_id = %txn.id,
            charge_id = %charge.id,
            change = ?change,
            "Payment recorded"
        );

        if product.is_lifetime() {
            let kind = match change {
                ChangeKind::New => NoticeKind::NewSubscription,
                ChangeKind::Upgrade => NoticeKind::Upgraded,
                ChangeKind::Downgrade => NoticeKind::Downgraded,
            };
            self.ctx.notify_transaction(kind, &txn).await;
            self.ctx.notify_transaction(NoticeKind::Welcome, &txn).await;
            self.ctx.notify_transaction(NoticeKind::Signup, &txn).await;
        }
        self.ctx.notify_transaction(NoticeKind::Receipt, &txn).await;
        self.ctx
            .notify_if_card_expiring(&txn, charge.card_summary().as_ref())
            .await;

        Ok(RecordOutcome::Applied(txn))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Recurring payments
    // ════════════════════════════════════════════════════════════════════════════

    /// Records a charge the processor made on its own billing schedule.
    pub async fn record_subscription_payment(
        &self,
        charge: &Charge,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let Some(customer_id) = charge.customer.as_deref() else {
            return Ok(RecordOutcome::NoMatch);
        };
        let Some(mut sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(customer_id)
            .await?
        else {
            tracing::warn!(customer_id, charge_id = %charge.id, "No subscription for recurring charge");
            return Ok(RecordOutcome::NoMatch);
        };
        if let Some(existing) = self.ctx.transactions.load_by_external_id(&charge.id).await? {
            // A redelivery still enforces a cycle limit whose cancel failed
            // on the first delivery.
            if existing.subscription_id == Some(sub.id)
                && existing.status == TransactionStatus::Complete
                && sub.status == SubscriptionStatus::Active
            {
                self.apply_cycle_limit(&sub, existing).await?;
            }
            return Ok(RecordOutcome::AlreadyApplied);
        }

        let first = self
            .ctx
            .transactions
            .list_for_subscription(&sub.id)
            .await?
            .into_iter()
            .next();
        let amount = self.ctx.settings.codec.decode(charge.amount);

        let mut txn = Transaction::pending(sub.user_id.clone(), sub.product_id.clone(), amount)
            .for_subscription(sub.id)
            .with_coupon(first.and_then(|t| t.coupon_id))
            .expiring_at(Some(Timestamp::now().add_days(sub.period_days())));
        txn.external_id = Some(charge.id.clone());
        txn.response = Some(charge.to_value());
        txn.transition(TransactionStatus::Complete)?;

        match self.ctx.transactions.store(&txn).await {
            Ok(()) => {}
            Err(LedgerError::DuplicateExternalId(_)) => {
                tracing::debug!(charge_id = %charge.id, "Recurring charge recorded concurrently");
                return Ok(RecordOutcome::AlreadyApplied);
            }
            Err(e) => return Err(e.into()),
        }

        self.reactivate(&mut sub);
        sub.refresh_card(charge.card_summary());
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(
            txn_id = %txn.id,
            subscription_id = %sub.id,
            charge_id = %charge.id,
            "Recurring payment recorded"
        );

        let txn = self.apply_cycle_limit(&sub, txn).await?;

        self.ctx.notify_transaction(NoticeKind::Receipt, &txn).await;
        self.ctx
            .notify_if_card_expiring(&txn, sub.card.as_ref())
            .await;

        Ok(RecordOutcome::Applied(txn))
    }

    /// Cancels quietly once the subscription has paid its last allowed cycle.
    async fn apply_cycle_limit(
        &self,
        sub: &Subscription,
        mut latest: Transaction,
    ) -> Result<Transaction, BillingError> {
        let Some(limit) = sub.cycle_limit else {
            return Ok(latest);
        };

        let paid_cycles = self
            .ctx
            .transactions
            .list_for_subscription(&sub.id)
            .await?
            .iter()
            .filter(|t| {
                t.status == TransactionStatus::Complete && t.txn_type == TransactionType::Payment
            })
            .count();
        if paid_cycles < limit.max_cycles as usize {
            return Ok(latest);
        }

        if limit.action == CycleLimitAction::Lifetime && latest.expires_at.is_some() {
            latest.expires_at = None;
            self.ctx.transactions.store(&latest).await?;
        }

        tracing::info!(
            subscription_id = %sub.id,
            paid_cycles,
            action = ?limit.action,
            "Payment cycle limit reached"
        );
        self.lifecycle
            .process_cancel_subscription(&sub.id, CancelOptions::silent())
            .await?;
        Ok(latest)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn record_payment_failure(
        &self,
        charge: &Charge,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        if let Some(mut txn) = self.ctx.transactions.load_by_external_id(&charge.id).await? {
            if txn.status == TransactionStatus::Failed {
                return Ok(RecordOutcome::AlreadyApplied);
            }
            if !txn.status.can_transition_to(&TransactionStatus::Failed) {
                tracing::warn!(txn_id = %txn.id, status = ?txn.status, "Ignoring failure for settled transaction");
                return Ok(RecordOutcome::AlreadyApplied);
            }
            let loaded_status = txn.status;
            txn.transition(TransactionStatus::Failed)?;
            txn.response = Some(charge.to_value());
            if !self
                .ctx
                .transactions
                .store_if_status(&txn, loaded_status)
                .await?
            {
                return Ok(RecordOutcome::AlreadyApplied);
            }

            tracing::info!(txn_id = %txn.id, charge_id = %charge.id, "Payment failed");
            self.ctx
                .notify_transaction(NoticeKind::PaymentFailed, &txn)
                .await;
            return Ok(RecordOutcome::Applied(txn));
        }

        let Some(customer_id) = charge.customer.as_deref() else {
            return Ok(RecordOutcome::NoMatch);
        };
        let Some(mut sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(customer_id)
            .await?
        else {
            return Ok(RecordOutcome::NoMatch);
        };

        let amount = self.ctx.settings.codec.decode(charge.amount);
        let mut txn = Transaction::pending(sub.user_id.clone(), sub.product_id.clone(), amount)
            .for_subscription(sub.id);
        txn.external_id = Some(charge.id.clone());
        txn.response = Some(charge.to_value());
        txn.transition(TransactionStatus::Failed)?;
        match self.ctx.transactions.store(&txn).await {
            Ok(()) => {}
            Err(LedgerError::DuplicateExternalId(_)) => {
                tracing::debug!(charge_id = %charge.id, "Failed charge recorded concurrently");
                return Ok(RecordOutcome::AlreadyApplied);
            }
            Err(e) => return Err(e.into()),
        }

        self.reactivate(&mut sub);
        self.ctx.subscriptions.store(&sub).await?;
        self.lifecycle.expire_entitlements(&sub, Some(txn.id)).await?;

        tracing::info!(
            txn_id = %txn.id,
            subscription_id = %sub.id,
            charge_id = %charge.id,
            "Recurring payment failed"
        );
        self.ctx
            .notify_transaction(NoticeKind::PaymentFailed, &txn)
            .await;
        Ok(RecordOutcome::Applied(txn))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Refunds
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn process_refund(
        &self,
        txn_id: &TransactionId,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let txn = self.ctx.transaction(txn_id).await?;
        let charge_id = txn
            .external_id
            .clone()
            .ok_or_else(|| BillingError::validation("transaction has no processor charge"))?;
        if txn.status == TransactionStatus::Refunded {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        let charge = self.ctx.gateway.refund_charge(&charge_id).await?;
        self.record_refund(&charge).await
    }

    pub async fn record_refund(
        &self,
        charge: &Charge,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let Some(mut txn) = self.ctx.transactions.load_by_external_id(&charge.id).await? else {
            return Ok(RecordOutcome::NoMatch);
        };
        if txn.status == TransactionStatus::Refunded {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        let loaded_status = txn.status;
        txn.transition(TransactionStatus::Refunded)?;
        if !self
            .ctx
            .transactions
            .store_if_status(&txn, loaded_status)
            .await?
        {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        tracing::info!(txn_id = %txn.id, charge_id = %charge.id, "Payment refunded");
        self.ctx.notify_transaction(NoticeKind::Refunded, &txn).await;
        Ok(RecordOutcome::Applied(txn))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Paid trials
    // ════════════════════════════════════════════════════════════════════════════

    /// Charges the trial fee against a newly created processor customer.
    ///
    /// The customer is stored on the subscription, so the follow-up
    /// `process_create_subscription` reuses it instead of asking for a new card.
    pub async fn process_trial_payment(
        &self,
        txn_id: &TransactionId,
        details: &PaymentDetails,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let mut txn = self.ctx.transaction(txn_id).await?;
        let sub_id = txn
            .subscription_id
            .ok_or_else(|| BillingError::validation("transaction has no subscription"))?;
        let mut sub = self.ctx.subscription(&sub_id).await?;
        if !sub.trial.is_paid() {
            return Err(BillingError::validation("subscription has no paid trial"));
        }
        if txn.status != TransactionStatus::Pending {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        let customer = self.lifecycle.resolve_customer(&mut sub, details).await?;
        txn.set_amount(sub.trial.amount);

        let charge = self
            .charge(
                &mut txn,
                PaymentSource::Customer(customer.id.clone()),
                details.client_ip.clone(),
            )
            .await?;
        self.record_trial_payment(&charge).await
    }

    pub async fn record_trial_payment(
        &self,
        charge: &Charge,
    ) -> Result<RecordOutcome<Transaction>, BillingError> {
        let Some(mut txn) = self.ctx.transactions.load_by_external_id(&charge.id).await? else {
            return Ok(RecordOutcome::NoMatch);
        };
        if txn.status == TransactionStatus::Complete {
            return Ok(RecordOutcome::AlreadyApplied);
        }
        let trial_days = match txn.subscription_id {
            Some(sub_id) => self.ctx.subscription(&sub_id).await?.trial.days,
            None => return Err(BillingError::validation("transaction has no subscription")),
        };

        let loaded_status = txn.status;
        txn.transition(TransactionStatus::Complete)?;
        txn.txn_type = TransactionType::Payment;
        txn.response = Some(charge.to_value());
        txn.expires_at = Some(Timestamp::now().add_days(i64::from(trial_days)));
        if !self
            .ctx
            .transactions
            .store_if_status(&txn, loaded_status)
            .await?
        {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        tracing::info!(txn_id = %txn.id, charge_id = %charge.id, trial_days, "Trial payment recorded");
        self.ctx.notify_transaction(NoticeKind::Receipt, &txn).await;
        Ok(RecordOutcome::Applied(txn))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn charge(
        &self,
        txn: &mut Transaction,
        source: PaymentSource,
        client_ip: Option<String>,
    ) -> Result<Charge, BillingError> {
        let product = self.ctx.product(&txn.product_id).await?;
        let codec = &self.ctx.settings.codec;
        let request = ChargeRequest {
            amount: codec.encode(txn.amount)?,
            currency: codec.code().to_string(),
            description: format!("{} (transaction: {})", product.name, txn.id),
            source,
            client_ip,
        };

        let charge = self.ctx.gateway.create_charge(&request).await?;

        txn.external_id = Some(charge.id.clone());
        txn.response = Some(charge.to_value());
        self.ctx.transactions.store(txn).await?;

        tracing::info!(txn_id = %txn.id, charge_id = %charge.id, amount = request.amount, "Charge created");
        Ok(charge)
    }

    /// Puts a billed subscription back to active. Cancelled subscriptions stay
    /// cancelled.
    fn reactivate(&self, sub: &mut Subscription) {
        if sub.status == SubscriptionStatus::Active {
            return;
        }
        if sub.status.can_transition_to(&SubscriptionStatus::Active) {
            sub.status = SubscriptionStatus::Active;
        } else {
            tracing::warn!(subscription_id = %sub.id, status = ?sub.status, "Charge for subscription that cannot be reactivated");
        }
    }
}
