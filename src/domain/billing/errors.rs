//! Billing error taxonomy.
//!
//! | Error | Raised when | HTTP status |
//! |-------|-------------|-------------|
//! | Validation | No usable payment source, or bad input | 400 |
//! | Transport | Processor unreachable or timed out | 502 |
//! | Processor | Processor returned a structured error | 402 |
//! | Protocol | Processor response could not be decoded | 502 |
//! | NotFound | Processor resource missing | 404 |
//! | RecordNotFound | Local record required but absent | 404 |
//! | InvalidTransition | Status machine refused a move | 409 |
//! | Storage | Ledger or catalog failed | 500 |

use thiserror::Error;

use crate::domain::foundation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("processor unreachable: {0}")]
    Transport(String),

    #[error("{message} ({kind})")]
    Processor { message: String, kind: String },

    #[error("undecipherable processor response: {0}")]
    Protocol(String),

    #[error("processor resource not found: {0}")]
    NotFound(String),

    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: &'static str, id: String },

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn record_not_found(entity: &'static str, id: impl ToString) -> Self {
        BillingError::RecordNotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation(_) => "VALIDATION_FAILED",
            BillingError::Transport(_) => "PROCESSOR_UNREACHABLE",
            BillingError::Processor { .. } => "PROCESSOR_ERROR",
            BillingError::Protocol(_) => "PROCESSOR_PROTOCOL_ERROR",
            BillingError::NotFound(_) => "PROCESSOR_NOT_FOUND",
            BillingError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            BillingError::InvalidTransition(_) => "INVALID_STATE_TRANSITION",
            BillingError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::InvalidFormat { field, .. } if field == "state_transition" => {
                BillingError::InvalidTransition(err.to_string())
            }
            _ => BillingError::Validation(err.to_string()),
        }
    }
}
