//! Local subscription record.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{
    ProductId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

use super::{BillingInterval, SubscriptionStatus};

/// Trial bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrialTerms {
    pub enabled: bool,
    pub days: u32,
    pub amount: Decimal,
}

impl TrialTerms {
    /// No trial at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// A free trial of `days` days.
    pub fn free(days: u32) -> Self {
        Self {
            enabled: true,
            days,
            amount: Decimal::ZERO,
        }
    }

    /// A trial charged up front.
    pub fn paid(days: u32, amount: Decimal) -> Self {
        Self {
            enabled: true,
            days,
            amount,
        }
    }

    /// True when the trial involves a real charge.
    pub fn is_paid(&self) -> bool {
        self.enabled && self.amount > Decimal::ZERO
    }
}

/// Last known card on file, as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
}

impl CardSummary {
    /// True if the card stops working before `at`.
    ///
    /// A card is valid through the last day of its expiry month.
    pub fn expires_before(&self, at: &Timestamp) -> bool {
        let (year, month) = if self.exp_month >= 12 {
            (self.exp_year + 1, 1)
        } else {
            (self.exp_year, self.exp_month + 1)
        };
        let Some(first_invalid_day) =
            NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        else {
            return false;
        };
        Utc.from_utc_datetime(&first_invalid_day) <= *at.as_datetime()
    }
}

/// What happens to access when the payment-cycle limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleLimitAction {
    /// Access lapses when the last paid period ends.
    Expire,
    /// The last paid period becomes permanent access.
    Lifetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleLimit {
    pub max_cycles: u32,
    pub action: CycleLimitAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Processor customer id, set once the customer exists.
    pub external_id: Option<String>,
    pub status: SubscriptionStatus,
    pub price: Decimal,
    pub interval: BillingInterval,
    pub interval_count: u32,
    pub trial: TrialTerms,
    pub card: Option<CardSummary>,
    /// Processor plan id once one has been bootstrapped.
    pub plan_id: Option<String>,
    pub response: Option<Value>,
    pub cycle_limit: Option<CycleLimit>,
    pub created_at: Timestamp,
}

impl Subscription {
    pub fn new(
        user_id: UserId,
        product_id: ProductId,
        price: Decimal,
        interval: BillingInterval,
        interval_count: u32,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            product_id,
            external_id: None,
            status: SubscriptionStatus::Pending,
            price,
            interval,
            interval_count,
            trial: TrialTerms::none(),
            card: None,
            plan_id: None,
            response: None,
            cycle_limit: None,
            created_at: Timestamp::now(),
        }
    }

    pub fn with_trial(mut self, trial: TrialTerms) -> Self {
        self.trial = trial;
        self
    }

    pub fn with_cycle_limit(mut self, limit: CycleLimit) -> Self {
        self.cycle_limit = Some(limit);
        self
    }

    /// Moves to `target`, rejecting edges the status machine forbids.
    pub fn transition(&mut self, target: SubscriptionStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }

    /// Length of one billing period in days.
    pub fn period_days(&self) -> i64 {
        self.interval.days(self.interval_count)
    }

    /// Plan id to look up first: the cached one, else the subscription id.
    pub fn plan_lookup_id(&self) -> String {
        self.plan_id.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Replaces the cached card when the processor reported one.
    pub fn refresh_card(&mut self, card: Option<CardSummary>) {
        if let Some(card) = card {
            self.card = Some(card);
        }
    }
}
