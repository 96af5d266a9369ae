//! Billing Reconciler - keeps a local payment and subscription ledger
//! consistent with a remote card processor.
//!
//! Checkout calls and processor webhooks both land on idempotent `record_*`
//! operations, so either may arrive first, repeat or race.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
