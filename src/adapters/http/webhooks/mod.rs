//! HTTP adapter for processor webhooks.
//!
//! - `POST /webhooks/processor` - Reconcile a processor notification
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, HealthResponse, WebhookAck};
pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::{health_routes, webhook_router, webhook_routes};
