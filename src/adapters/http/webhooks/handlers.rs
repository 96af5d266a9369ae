//! HTTP handlers for processor webhooks.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::application::WebhookReconciler;
use crate::domain::billing::BillingError;

use super::dto::{ErrorResponse, HealthResponse, WebhookAck};

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub reconciler: Arc<WebhookReconciler>,
}

impl WebhookAppState {
    pub fn new(reconciler: Arc<WebhookReconciler>) -> Self {
        Self { reconciler }
    }
}

/// POST /webhooks/processor - Reconcile a processor notification
///
/// Dropped and ignored notifications are acknowledged with 200 so the
/// processor stops retrying. Recording failures answer 5xx so it redelivers.
pub async fn handle_processor_webhook(
    State(state): State<WebhookAppState>,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let outcome = state.reconciler.handle(&body).await?;
    Ok((StatusCode::OK, Json(WebhookAck::from(outcome))))
}

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(BillingError);

impl From<BillingError> for WebhookApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl WebhookApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::Transport(_) | BillingError::Protocol(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        tracing::error!(
            error_code = self.0.code(),
            error = %self.0,
            status = status.as_u16(),
            "Webhook recording failed"
        );
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
