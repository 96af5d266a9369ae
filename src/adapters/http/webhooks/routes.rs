//! Axum router configuration for webhook and health endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{handle_processor_webhook, health, WebhookAppState};

/// # Routes
/// - `POST /processor` - Reconcile a processor notification
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/processor", post(handle_processor_webhook))
}

/// # Routes
/// - `GET /health` - Liveness probe
pub fn health_routes() -> Router<WebhookAppState> {
    Router::new().route("/health", get(health))
}

/// Complete router, mounting webhooks under `/webhooks`.
///
/// ```ignore
/// let app = webhook_router().with_state(WebhookAppState::new(reconciler));
/// ```
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .merge(health_routes())
}
