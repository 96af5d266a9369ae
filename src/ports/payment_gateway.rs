//! Payment gateway port.
//!
//! Typed operations against the remote card processor. Implementations map
//! transport faults, structured processor errors, undecodable bodies and
//! missing resources to distinct [`GatewayError`] variants so callers can
//! react to `NotFound` without treating every failure as "missing".

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{BillingError, PaymentSource, PlanSpec};

use super::{Charge, Customer, Event, Plan, ProcessorSubscription};

/// Port for the remote card processor.
///
/// No method retries on its own; a failed call surfaces to the caller.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture a one-off charge.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError>;

    /// Refund a previously captured charge in full.
    async fn refund_charge(&self, charge_id: &str) -> Result<Charge, GatewayError>;

    /// Create a customer holding a card.
    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<Customer, GatewayError>;

    /// Replace a customer's card using a single-use token.
    async fn update_customer_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<Customer, GatewayError>;

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, GatewayError>;

    /// Fetch a plan; `GatewayError::NotFound` if it does not exist.
    async fn get_plan(&self, plan_id: &str) -> Result<Plan, GatewayError>;

    async fn create_plan(&self, spec: &PlanSpec) -> Result<Plan, GatewayError>;

    /// Subscribe a customer to a plan.
    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<ProcessorSubscription, GatewayError>;

    /// Stop billing a customer. Used for both suspension and cancellation.
    async fn delete_subscription(
        &self,
        customer_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError>;

    /// Put a customer back on a plan.
    async fn resume_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError>;

    /// Fetch the canonical copy of an event.
    async fn get_event(&self, event_id: &str) -> Result<Event, GatewayError>;
}

/// Request to capture a charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub source: PaymentSource,
    pub client_ip: Option<String>,
}

/// Request to create a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    /// Token or raw card. A customer reference is rejected by implementations.
    pub source: PaymentSource,
    pub email: String,
    pub description: String,
}

/// Request to subscribe a customer to a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub client_ip: Option<String>,
}

/// Gateway failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connection failure or timeout.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The processor answered with an error envelope.
    #[error("{message} ({kind})")]
    Processor { message: String, kind: String },

    /// The response body could not be decoded.
    #[error("undecipherable processor response: {0}")]
    Protocol(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(msg) => BillingError::Transport(msg),
            GatewayError::Processor { message, kind } => BillingError::Processor { message, kind },
            GatewayError::Protocol(msg) => BillingError::Protocol(msg),
            GatewayError::NotFound(msg) => BillingError::NotFound(msg),
        }
    }
}
