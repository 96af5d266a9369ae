//! SubscriptionLifecycleManager - create, update, suspend, resume and cancel
//! recurring subscriptions against the processor and the local ledger.
//!
//! Every `process_*` method talks to the processor first and then hands the
//! processor's answer to the matching `record_*` method. The `record_*`
//! methods are also reached from webhooks, so they inspect persisted state
//! before mutating and report re-delivery as `RecordOutcome::AlreadyApplied`.

use chrono::Duration;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::billing::{
    new_plan_id, BillingError, ChangeKind, PaymentDetails, PlanSpec, Product, RecordOutcome,
    Subscription, SubscriptionStatus, Transaction, TransactionStatus, TransactionType,
    TrialTerms,
};
use crate::domain::foundation::{
    StateMachine, SubscriptionId, Timestamp, TransactionId, UserId,
};
use crate::ports::{
    CreateCustomerRequest, CreateSubscriptionRequest, Customer, NoticeKind, Plan,
    ProcessorSubscription,
};

use super::context::BillingContext;

/// Explicit switches for cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelOptions {
    /// Suppress the member notice. Used for internally-triggered cancellation.
    pub silent: bool,
    /// Cut off the subscription's outstanding entitlements now.
    pub expire_entitlements: bool,
}

impl CancelOptions {
    /// Quiet cancellation that lets paid access run out naturally.
    pub fn silent() -> Self {
        Self {
            silent: true,
            expire_entitlements: false,
        }
    }

    /// Quiet cancellation of a subscription replaced by a new purchase.
    pub fn superseded() -> Self {
        Self {
            silent: true,
            expire_entitlements: true,
        }
    }
}

/// How a plan is obtained for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanResolution {
    /// Fetch the cached plan, bootstrapping one only if the processor has none.
    Reuse,
    /// Always bootstrap a new plan.
    Fresh,
}

/// Orchestrates the subscription lifecycle.
pub struct SubscriptionLifecycleManager {
    ctx: BillingContext,
}

impl SubscriptionLifecycleManager {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Create
    // ════════════════════════════════════════════════════════════════════════════

    /// Subscribes the checkout transaction's subscription at the processor.
    pub async fn process_create_subscription(
        &self,
        txn_id: &TransactionId,
        details: &PaymentDetails,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let txn = self.ctx.transaction(txn_id).await?;
        let sub_id = txn
            .subscription_id
            .ok_or_else(|| BillingError::validation("transaction has no subscription"))?;
        let mut sub = self.ctx.subscription(&sub_id).await?;

        let customer = self.resolve_customer(&mut sub, details).await?;
        let plan = self.resolve_plan(&mut sub, PlanResolution::Reuse).await?;

        self.ctx
            .gateway
            .create_subscription(&CreateSubscriptionRequest {
                customer_id: customer.id.clone(),
                plan_id: plan.id.clone(),
                client_ip: details.client_ip.clone(),
            })
            .await?;

        sub.external_id = Some(customer.id.clone());
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(
            subscription_id = %sub.id,
            customer_id = %customer.id,
            plan_id = %plan.id,
            "Processor subscription created"
        );

        self.record_create_subscription(&customer).await
    }

    /// Activates the local subscription for a processor customer.
    ///
    /// Storing the subscription as active is the last write. A failure before
    /// it leaves the subscription pending, so a retry redoes the remaining
    /// steps.
    pub async fn record_create_subscription(
        &self,
        customer: &Customer,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let Some(mut sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(&customer.id)
            .await?
        else {
            tracing::warn!(customer_id = %customer.id, "No subscription for processor customer");
            return Ok(RecordOutcome::NoMatch);
        };

        if sub.status != SubscriptionStatus::Pending {
            tracing::debug!(subscription_id = %sub.id, status = ?sub.status, "Subscription already activated");
            return Ok(RecordOutcome::AlreadyApplied);
        }
        ensure_transition(&sub, SubscriptionStatus::Active)?;

        // Classification reads the prior subscription, so it must run before
        // the prior is cancelled.
        let product = self.ctx.product(&sub.product_id).await?;
        let prior = self.find_prior(&sub.user_id, &product, Some(sub.id)).await?;
        let change = ChangeKind::classify(&product, prior.as_ref().map(|(_, p)| p));

        if let Some((prior_sub, _)) = prior {
            self.cancel_superseded(prior_sub).await?;
        }

        if !sub.trial.is_paid() {
            self.confirm_first_transaction(&sub, &customer.id).await?;
        }

        sub.response = Some(customer.to_value());
        sub.transition(SubscriptionStatus::Active)?;
        sub.refresh_card(customer.default_card());
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(
            subscription_id = %sub.id,
            customer_id = %customer.id,
            change = ?change,
            "Subscription activated"
        );

        self.ctx
            .notify_subscription(change_notice(change), &sub)
            .await;
        self.ctx.notify_subscription(NoticeKind::Welcome, &sub).await;
        self.ctx.notify_subscription(NoticeKind::Signup, &sub).await;

        Ok(RecordOutcome::Applied(sub))
    }

    /// Turns the checkout transaction into a zero-amount confirmation that
    /// grants access until the first real charge lands.
    async fn confirm_first_transaction(
        &self,
        sub: &Subscription,
        customer_id: &str,
    ) -> Result<(), BillingError> {
        let transactions = self.ctx.transactions.list_for_subscription(&sub.id).await?;
        let Some(mut txn) = transactions.into_iter().next() else {
            return Ok(());
        };
        if txn.status != TransactionStatus::Pending {
            return Ok(());
        }

        let window_days = if sub.trial.enabled {
            sub.trial.days
        } else {
            self.ctx.settings.grace_init_days
        };

        let purchase_total = txn.amount;
        txn.transition(TransactionStatus::Confirmed)?;
        txn.txn_type = TransactionType::SubscriptionConfirmation;
        txn.external_id = Some(customer_id.to_string());
        txn.amount = Decimal::ZERO;
        txn.gross = purchase_total;
        txn.expires_at = Some(Timestamp::now().add_days(i64::from(window_days)));
        self.ctx.transactions.store(&txn).await?;

        tracing::debug!(txn_id = %txn.id, window_days, "Confirmation transaction recorded");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Update
    // ════════════════════════════════════════════════════════════════════════════

    /// Replaces the card on file using a single-use token.
    pub async fn process_update_subscription(
        &self,
        sub_id: &SubscriptionId,
        token: &str,
    ) -> Result<Subscription, BillingError> {
        if token.trim().is_empty() {
            return Err(BillingError::validation("a card token is required"));
        }
        let mut sub = self.ctx.subscription(sub_id).await?;
        let customer_id = sub
            .external_id
            .clone()
            .ok_or_else(|| BillingError::validation("subscription has no processor customer"))?;

        let customer = self
            .ctx
            .gateway
            .update_customer_card(&customer_id, token)
            .await?;

        sub.refresh_card(customer.default_card());
        sub.response = Some(customer.to_value());
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(subscription_id = %sub.id, customer_id = %customer_id, "Card on file updated");
        Ok(sub)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Suspend / Resume
    // ════════════════════════════════════════════════════════════════════════════

    /// Stops billing at the processor while keeping the subscription resumable.
    pub async fn process_suspend_subscription(
        &self,
        sub_id: &SubscriptionId,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let sub = self.ctx.subscription(sub_id).await?;
        let Some(customer_id) = sub.external_id.clone() else {
            return Ok(RecordOutcome::NoMatch);
        };
        if sub.status == SubscriptionStatus::Suspended {
            return Ok(RecordOutcome::AlreadyApplied);
        }
        ensure_transition(&sub, SubscriptionStatus::Suspended)?;

        let deleted = self.ctx.gateway.delete_subscription(&customer_id).await?;
        self.record_suspend_subscription(&deleted).await
    }

    pub async fn record_suspend_subscription(
        &self,
        deleted: &ProcessorSubscription,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let Some(mut sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(&deleted.customer)
            .await?
        else {
            return Ok(RecordOutcome::NoMatch);
        };
        if sub.status == SubscriptionStatus::Suspended {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        sub.transition(SubscriptionStatus::Suspended)?;
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(subscription_id = %sub.id, customer_id = %deleted.customer, "Subscription suspended");
        self.ctx
            .notify_subscription(NoticeKind::Suspended, &sub)
            .await;
        Ok(RecordOutcome::Applied(sub))
    }

    /// Puts a suspended subscription back on a plan.
    ///
    /// The new plan carries a trial covering whatever paid access is left,
    /// so the member is not billed twice for the same days.
    pub async fn process_resume_subscription(
        &self,
        sub_id: &SubscriptionId,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let mut sub = self.ctx.subscription(sub_id).await?;
        let Some(customer_id) = sub.external_id.clone() else {
            return Ok(RecordOutcome::NoMatch);
        };
        match sub.status {
            SubscriptionStatus::Active => return Ok(RecordOutcome::AlreadyApplied),
            SubscriptionStatus::Suspended => {}
            other => {
                return Err(BillingError::InvalidTransition(format!(
                    "cannot resume a {:?} subscription",
                    other
                )))
            }
        }

        let now = Timestamp::now();
        let remaining_days = match self.access_expiry(&sub).await? {
            Some(expires_at) if expires_at.is_after(&now) => now.whole_days_until(&expires_at),
            _ => 0,
        };

        let original_trial = sub.trial.clone();
        sub.trial = if remaining_days > 0 {
            TrialTerms::free(remaining_days)
        } else {
            TrialTerms::none()
        };
        let plan = self.resolve_plan(&mut sub, PlanResolution::Fresh).await;
        sub.trial = original_trial;
        let plan = plan?;

        self.ctx
            .gateway
            .resume_subscription(&customer_id, &plan.id)
            .await?;

        tracing::info!(
            subscription_id = %sub.id,
            customer_id = %customer_id,
            plan_id = %plan.id,
            remaining_days,
            "Processor subscription resumed"
        );

        let customer = self.cached_customer(&sub, &customer_id).await?;
        self.record_resume_subscription(&customer).await
    }

    pub async fn record_resume_subscription(
        &self,
        customer: &Customer,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let Some(mut sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(&customer.id)
            .await?
        else {
            return Ok(RecordOutcome::NoMatch);
        };
        if sub.status == SubscriptionStatus::Active {
            return Ok(RecordOutcome::AlreadyApplied);
        }

        sub.transition(SubscriptionStatus::Active)?;
        sub.refresh_card(customer.default_card());
        sub.response = Some(customer.to_value());

        let now = Timestamp::now();
        let lapsed = match self.access_expiry(&sub).await? {
            Some(expires_at) => !expires_at.is_after(&now),
            None => true,
        };
        if lapsed {
            self.grant_resume_confirmation(&sub, &customer.id, &now)
                .await?;
        }

        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(subscription_id = %sub.id, customer_id = %customer.id, lapsed, "Subscription resumed");
        self.ctx.notify_subscription(NoticeKind::Resumed, &sub).await;
        Ok(RecordOutcome::Applied(sub))
    }

    /// Short confirmation so access returns before the next real charge.
    async fn grant_resume_confirmation(
        &self,
        sub: &Subscription,
        customer_id: &str,
        now: &Timestamp,
    ) -> Result<(), BillingError> {
        let days = i64::from(self.ctx.settings.resume_confirmation_days);
        let mut txn = Transaction::pending(
            sub.user_id.clone(),
            sub.product_id.clone(),
            Decimal::ZERO,
        )
        .for_subscription(sub.id)
        .expiring_at(Some(now.add_days(days)));
        txn.external_id = Some(format!("{}-{}", customer_id, Uuid::new_v4().simple()));
        txn.txn_type = TransactionType::SubscriptionConfirmation;
        txn.transition(TransactionStatus::Confirmed)?;
        self.ctx.transactions.store(&txn).await?;

        tracing::debug!(txn_id = %txn.id, subscription_id = %sub.id, days, "Resume confirmation recorded");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancel
    // ════════════════════════════════════════════════════════════════════════════

    /// Stops billing for good.
    ///
    /// A suspended subscription has nothing left to stop at the processor and
    /// is cancelled locally only.
    pub async fn process_cancel_subscription(
        &self,
        sub_id: &SubscriptionId,
        options: CancelOptions,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let sub = self.ctx.subscription(sub_id).await?;
        self.cancel(sub, options).await
    }

    async fn cancel(
        &self,
        sub: Subscription,
        options: CancelOptions,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        match sub.status {
            SubscriptionStatus::Cancelled => Ok(RecordOutcome::AlreadyApplied),
            SubscriptionStatus::Suspended => self.apply_cancel(sub, options).await,
            _ => {
                let Some(customer_id) = sub.external_id.clone() else {
                    return Ok(RecordOutcome::NoMatch);
                };
                ensure_transition(&sub, SubscriptionStatus::Cancelled)?;
                let deleted = self.ctx.gateway.delete_subscription(&customer_id).await?;
                self.record_cancel_subscription(&deleted, options).await
            }
        }
    }

    /// Records a processor-side cancellation.
    ///
    /// Suspension deletes the processor subscription too, so a deletion for a
    /// suspended subscription is the echo of that suspension and changes
    /// nothing.
    pub async fn record_cancel_subscription(
        &self,
        deleted: &ProcessorSubscription,
        options: CancelOptions,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        let Some(sub) = self
            .ctx
            .subscriptions
            .load_by_external_id(&deleted.customer)
            .await?
        else {
            return Ok(RecordOutcome::NoMatch);
        };
        if matches!(
            sub.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Suspended
        ) {
            return Ok(RecordOutcome::AlreadyApplied);
        }
        self.apply_cancel(sub, options).await
    }

    async fn apply_cancel(
        &self,
        mut sub: Subscription,
        options: CancelOptions,
    ) -> Result<RecordOutcome<Subscription>, BillingError> {
        sub.transition(SubscriptionStatus::Cancelled)?;
        if options.expire_entitlements {
            self.expire_entitlements(&sub, None).await?;
        }
        self.ctx.subscriptions.store(&sub).await?;

        tracing::info!(
            subscription_id = %sub.id,
            silent = options.silent,
            expire_entitlements = options.expire_entitlements,
            "Subscription cancelled"
        );
        if !options.silent {
            self.ctx
                .notify_subscription(NoticeKind::Cancelled, &sub)
                .await;
        }
        Ok(RecordOutcome::Applied(sub))
    }

    /// Cancels a subscription replaced by a new purchase in the same group.
    pub async fn cancel_superseded(&self, prior: Subscription) -> Result<(), BillingError> {
        let prior_id = prior.id;
        // Reload so a concurrent cancel is seen and the processor is not
        // asked to delete twice.
        let prior = self.ctx.subscription(&prior_id).await?;
        let outcome = self.cancel(prior, CancelOptions::superseded()).await?;
        tracing::info!(subscription_id = %prior_id, applied = outcome.is_applied(), "Superseded subscription cancelled");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Shared helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// The member's live subscription in the same product group, if any.
    pub async fn find_prior(
        &self,
        user_id: &UserId,
        purchased: &Product,
        exclude: Option<SubscriptionId>,
    ) -> Result<Option<(Subscription, Product)>, BillingError> {
        let subscriptions = self.ctx.subscriptions.list_for_user(user_id).await?;

        for sub in subscriptions.into_iter().rev() {
            if Some(sub.id) == exclude || !sub.status.is_live() {
                continue;
            }
            let Some(product) = self.ctx.catalog.load_product(&sub.product_id).await? else {
                continue;
            };
            if product.shares_group_with(purchased) {
                return Ok(Some((sub, product)));
            }
        }
        Ok(None)
    }

    /// Expires every access-granting transaction of the subscription except
    /// `keep`. Returns how many were cut off.
    pub async fn expire_entitlements(
        &self,
        sub: &Subscription,
        keep: Option<TransactionId>,
    ) -> Result<usize, BillingError> {
        let now = Timestamp::now();
        let cutoff = Timestamp::from_datetime(*now.as_datetime() - Duration::seconds(1));
        let mut expired = 0;

        for mut txn in self.ctx.transactions.list_for_subscription(&sub.id).await? {
            if Some(txn.id) == keep || !txn.grants_access_at(&now) {
                continue;
            }
            txn.expires_at = Some(cutoff);
            self.ctx.transactions.store(&txn).await?;
            expired += 1;
        }

        if expired > 0 {
            tracing::debug!(subscription_id = %sub.id, expired, "Entitlements expired");
        }
        Ok(expired)
    }

    /// Reuses the stored processor customer, or creates one from a token or
    /// raw card and the member's contact details.
    pub async fn resolve_customer(
        &self,
        sub: &mut Subscription,
        details: &PaymentDetails,
    ) -> Result<Customer, BillingError> {
        if let Some(customer) = sub.response.as_ref().and_then(Customer::from_stored) {
            return Ok(customer);
        }
        if let Some(customer_id) = sub.external_id.clone() {
            return Ok(self.ctx.gateway.get_customer(&customer_id).await?);
        }

        let source = details.customer_source()?;
        let member = self.ctx.member(&sub.user_id).await?;
        let customer = self
            .ctx
            .gateway
            .create_customer(&CreateCustomerRequest {
                source,
                email: member.email,
                description: member.full_name,
            })
            .await?;

        sub.external_id = Some(customer.id.clone());
        sub.response = Some(customer.to_value());
        self.ctx.subscriptions.store(sub).await?;

        tracing::info!(subscription_id = %sub.id, customer_id = %customer.id, "Processor customer created");
        Ok(customer)
    }

    async fn cached_customer(
        &self,
        sub: &Subscription,
        customer_id: &str,
    ) -> Result<Customer, BillingError> {
        match sub.response.as_ref().and_then(Customer::from_stored) {
            Some(customer) if customer.id == customer_id => Ok(customer),
            _ => Ok(self.ctx.gateway.get_customer(customer_id).await?),
        }
    }

    /// Finds or bootstraps the processor plan for a subscription.
    ///
    /// Only a `NotFound` answer triggers a bootstrap; every other failure
    /// propagates. A bootstrapped plan id is persisted before the plan is
    /// created so a retry never mints a second id for the same attempt.
    pub async fn resolve_plan(
        &self,
        sub: &mut Subscription,
        resolution: PlanResolution,
    ) -> Result<Plan, BillingError> {
        if resolution == PlanResolution::Reuse {
            let plan_id = sub.plan_lookup_id();
            match self.ctx.gateway.get_plan(&plan_id).await {
                Ok(plan) => return Ok(plan),
                Err(e) if e.is_not_found() => {
                    tracing::info!(subscription_id = %sub.id, plan_id = %plan_id, "Plan not found, bootstrapping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let product = self.ctx.product(&sub.product_id).await?;
        let plan_id = new_plan_id(sub, &self.ctx.settings.site_host);
        sub.plan_id = Some(plan_id.clone());
        self.persist_plan_id(sub).await?;

        let spec = PlanSpec::for_subscription(
            plan_id,
            sub,
            &product.name,
            &self.ctx.settings.codec,
            &self.ctx.settings.site_name,
        )?;
        let plan = self.ctx.gateway.create_plan(&spec).await?;

        tracing::info!(subscription_id = %sub.id, plan_id = %plan.id, "Plan created");
        Ok(plan)
    }

    /// Writes only the plan mapping, leaving other stored fields untouched.
    async fn persist_plan_id(&self, sub: &Subscription) -> Result<(), BillingError> {
        let mut stored = self
            .ctx
            .subscriptions
            .load_by_id(&sub.id)
            .await?
            .unwrap_or_else(|| sub.clone());
        stored.plan_id = sub.plan_id.clone();
        self.ctx.subscriptions.store(&stored).await?;
        Ok(())
    }

    /// Expiry of the newest access-granting transaction.
    async fn access_expiry(&self, sub: &Subscription) -> Result<Option<Timestamp>, BillingError> {
        let transactions = self.ctx.transactions.list_for_subscription(&sub.id).await?;
        Ok(transactions
            .iter()
            .rev()
            .find(|t| t.status.grants_access())
            .and_then(|t| t.expires_at))
    }
}

fn ensure_transition(
    sub: &Subscription,
    target: SubscriptionStatus,
) -> Result<(), BillingError> {
    if sub.status.can_transition_to(&target) {
        Ok(())
    } else {
        Err(BillingError::InvalidTransition(format!(
            "{:?} -> {:?}",
            sub.status, target
        )))
    }
}

fn change_notice(change: ChangeKind) -> NoticeKind {
    match change {
        ChangeKind::New => NoticeKind::NewSubscription,
        ChangeKind::Upgrade => NoticeKind::Upgraded,
        ChangeKind::Downgrade => NoticeKind::Downgraded,
    }
}
