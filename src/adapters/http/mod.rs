//! HTTP adapters - inbound endpoints.

pub mod webhooks;

pub use webhooks::{webhook_router, WebhookAppState};
