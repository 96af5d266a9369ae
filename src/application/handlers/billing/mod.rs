//! Billing handlers - payment and subscription reconciliation against the
//! card processor.
//!
//! - `PaymentProcessor` - charges, recurring payments, failures, refunds, paid trials
//! - `SubscriptionLifecycleManager` - create, update, suspend, resume, cancel
//! - `WebhookReconciler` - inbound notification routing

mod context;
mod payment_processor;
mod subscription_lifecycle;
mod webhook_reconciler;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{BillingContext, BillingSettings};
pub use payment_processor::PaymentProcessor;
pub use subscription_lifecycle::{CancelOptions, PlanResolution, SubscriptionLifecycleManager};
pub use webhook_reconciler::{ReconcileOutcome, WebhookReconciler};
