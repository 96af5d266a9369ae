//! Response bodies for the webhook endpoints.

use serde::{Deserialize, Serialize};

use crate::application::ReconcileOutcome;

/// Acknowledgement returned for every accepted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    /// `dropped`, `ignored` or `recorded`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Dropped => Self {
                status: "dropped".to_string(),
                event_id: None,
                event_type: None,
                applied: None,
            },
            ReconcileOutcome::Ignored {
                event_id,
                event_type,
            } => Self {
                status: "ignored".to_string(),
                event_id: Some(event_id),
                event_type: Some(event_type),
                applied: None,
            },
            ReconcileOutcome::Recorded {
                event_id,
                event_type,
                applied,
            } => Self {
                status: "recorded".to_string(),
                event_id: Some(event_id),
                event_type: Some(event_type),
                applied: Some(applied),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Standard error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
