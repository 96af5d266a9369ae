//! Application handlers.
//!
//! Services that orchestrate domain operations across ports.

pub mod billing;

pub use billing::{
    BillingContext, BillingSettings, CancelOptions, PaymentProcessor, PlanResolution,
    ReconcileOutcome, SubscriptionLifecycleManager, WebhookReconciler,
};
