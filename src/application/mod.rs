//! Application layer - billing services.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    BillingContext, BillingSettings, CancelOptions, PaymentProcessor, PlanResolution,
    ReconcileOutcome, SubscriptionLifecycleManager, WebhookReconciler,
};
