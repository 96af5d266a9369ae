//! Stripe-style implementation of the `PaymentGateway` port.
//!
//! Builds form bodies for each processor endpoint, sends them through
//! [`GatewayClient`] and decodes the typed record out of the JSON reply.
//!
//! # Configuration
//!
//! ```ignore
//! let config = ProcessorConfig::new("sk_test_...");
//! let gateway = StripeGateway::new(&config)?;
//! ```

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ProcessorConfig;
use crate::domain::billing::{PaymentSource, PlanSpec};
use crate::ports::{
    Charge, ChargeRequest, CreateCustomerRequest, CreateSubscriptionRequest, Customer, Event,
    GatewayError, PaymentGateway, Plan, ProcessorSubscription,
};

use super::client::{FormBody, GatewayClient, RequestEnvelope};

/// Processor gateway over the authenticated HTTP client.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: GatewayClient,
}

impl StripeGateway {
    pub fn new(config: &ProcessorConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: GatewayClient::new(config)?,
        })
    }

    pub fn with_client(client: GatewayClient) -> Self {
        Self { client }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        envelope: RequestEnvelope,
        record: &'static str,
    ) -> Result<T, GatewayError> {
        let endpoint = envelope.endpoint.clone();
        let value = self.client.send(envelope).await?.into_json()?;
        decode(value, record).map_err(|e| {
            tracing::warn!(endpoint = %endpoint, error = %e, "Processor returned an unexpected record");
            e
        })
    }
}

fn decode<T: DeserializeOwned>(value: Value, record: &'static str) -> Result<T, GatewayError> {
    serde_json::from_value(value)
        .map_err(|e| GatewayError::Protocol(format!("malformed {} record: {}", record, e)))
}

/// Writes the payment source the way the processor expects it: a token or a
/// nested card under `card`, a customer reference under `customer`.
fn with_source(body: FormBody, source: &PaymentSource) -> FormBody {
    match source {
        PaymentSource::Token(token) => body.field("card", token),
        PaymentSource::Customer(customer) => body.field("customer", customer),
        PaymentSource::Card(card) => body
            .nested("card", "number", card.number.expose_secret())
            .nested("card", "exp_month", card.exp_month)
            .nested("card", "exp_year", card.exp_year)
            .nested("card", "cvc", card.cvc.expose_secret()),
    }
}

fn with_client_ip(body: FormBody, client_ip: Option<&String>) -> FormBody {
    match client_ip {
        Some(ip) => body.nested("metadata", "ip_address", ip),
        None => body,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let body = FormBody::new()
            .field("amount", request.amount)
            .field("currency", &request.currency)
            .field("description", &request.description);
        let body = with_client_ip(body, request.client_ip.as_ref());
        let body = with_source(body, &request.source);

        self.request(RequestEnvelope::post("charges", body), "charge")
            .await
    }

    async fn refund_charge(&self, charge_id: &str) -> Result<Charge, GatewayError> {
        self.request(
            RequestEnvelope::post(format!("charges/{}/refund", charge_id), FormBody::new()),
            "charge",
        )
        .await
    }

    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<Customer, GatewayError> {
        if matches!(request.source, PaymentSource::Customer(_)) {
            return Err(GatewayError::Processor {
                message: "a customer must be created from a token or card".to_string(),
                kind: "invalid_request_error".to_string(),
            });
        }

        let body = with_source(FormBody::new(), &request.source)
            .field("email", &request.email)
            .field("description", &request.description);

        self.request(RequestEnvelope::post("customers", body), "customer")
            .await
    }

    async fn update_customer_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<Customer, GatewayError> {
        let body = FormBody::new().field("card", token);
        self.request(
            RequestEnvelope::post(format!("customers/{}", customer_id), body),
            "customer",
        )
        .await
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, GatewayError> {
        self.request(
            RequestEnvelope::get(format!("customers/{}", customer_id)),
            "customer",
        )
        .await
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Plan, GatewayError> {
        self.request(RequestEnvelope::get(format!("plans/{}", plan_id)), "plan")
            .await
    }

    async fn create_plan(&self, spec: &PlanSpec) -> Result<Plan, GatewayError> {
        let body = FormBody::new()
            .field("amount", spec.amount)
            .field("interval", spec.interval.as_str())
            .field("interval_count", spec.interval_count)
            .field("name", &spec.name)
            .field("currency", &spec.currency)
            .field("id", &spec.id)
            .field("statement_descriptor", &spec.statement_descriptor)
            .maybe_field("trial_period_days", spec.trial_period_days);

        self.request(RequestEnvelope::post("plans", body), "plan")
            .await
    }

    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<ProcessorSubscription, GatewayError> {
        let body = FormBody::new().field("plan", &request.plan_id);
        let body = with_client_ip(body, request.client_ip.as_ref());

        self.request(
            RequestEnvelope::post(format!("customers/{}/subscriptions", request.customer_id), body),
            "subscription",
        )
        .await
    }

    async fn delete_subscription(
        &self,
        customer_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError> {
        self.request(
            RequestEnvelope::delete(format!("customers/{}/subscription", customer_id)),
            "subscription",
        )
        .await
    }

    async fn resume_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError> {
        let body = FormBody::new().field("plan", plan_id);
        self.request(
            RequestEnvelope::post(format!("customers/{}/subscription", customer_id), body),
            "subscription",
        )
        .await
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, GatewayError> {
        self.request(RequestEnvelope::get(format!("events/{}", event_id)), "event")
            .await
    }
}
