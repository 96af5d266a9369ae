//! Recurring plan derivation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::ValidationError;

use super::{BillingInterval, CurrencyCodec, Subscription};

/// Longest statement descriptor taken from the site name.
const STATEMENT_DESCRIPTOR_LEN: usize = 21;

/// Everything needed to create a plan at the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub interval_count: u32,
    pub name: String,
    pub statement_descriptor: String,
    pub trial_period_days: Option<u32>,
}

impl PlanSpec {
    /// Derives a plan from the subscription's price, interval and trial.
    pub fn for_subscription(
        plan_id: impl Into<String>,
        subscription: &Subscription,
        product_name: &str,
        codec: &CurrencyCodec,
        site_name: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: plan_id.into(),
            amount: codec.encode(subscription.price)?,
            currency: codec.code().to_string(),
            interval: subscription.interval,
            interval_count: subscription.interval_count,
            name: product_name.to_string(),
            statement_descriptor: site_name.chars().take(STATEMENT_DESCRIPTOR_LEN).collect(),
            trial_period_days: subscription
                .trial
                .enabled
                .then_some(subscription.trial.days),
        })
    }
}

/// Globally unique plan id: `<subscription>-<site host>-<random>`.
pub fn new_plan_id(subscription: &Subscription, site_host: &str) -> String {
    format!(
        "{}-{}-{}",
        subscription.id,
        site_host,
        Uuid::new_v4().simple()
    )
}
