//! Mock payment gateway for testing.
//!
//! Provides a configurable in-process implementation of `PaymentGateway` for
//! unit and integration tests. Supports:
//! - Pre-configured plans, customers and events
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::billing::{PaymentSource, PlanSpec};
use crate::ports::{
    CardDetails, CardList, Charge, ChargeRequest, CreateCustomerRequest,
    CreateSubscriptionRequest, Customer, Event, EventData, GatewayError, PaymentGateway, Plan,
    ProcessorSubscription,
};

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentGateway::new();
///
/// // Configure state
/// mock.add_plan(plan);
/// mock.add_event("evt_1", "charge.failed", json!({ "id": "ch_1" }));
///
/// // Inject errors
/// mock.set_method_error("create_charge", GatewayError::Transport("timeout".into()));
///
/// // Assert on calls
/// assert_eq!(mock.call_count("create_plan"), 1);
/// ```
#[derive(Default)]
pub struct MockPaymentGateway {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    charges: HashMap<String, Charge>,
    customers: HashMap<String, Customer>,
    plans: HashMap<String, Plan>,
    events: HashMap<String, Event>,

    /// Plans created through the port, in order.
    created_plans: Vec<PlanSpec>,

    /// Next charge to return from `create_charge`.
    next_charge: Option<Charge>,

    /// Card attached to generated charges and customers.
    card: Option<CardDetails>,

    /// Specific errors by method name.
    method_errors: HashMap<String, GatewayError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// Card the mock reports unless told otherwise.
pub fn mock_card() -> CardDetails {
    CardDetails {
        id: Some("card_mock".to_string()),
        object: Some("card".to_string()),
        last4: Some("4242".to_string()),
        exp_month: Some(12),
        exp_year: Some(2030),
    }
}

fn mock_id(prefix: &str) -> String {
    format!("{}_mock_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

fn describe_source(source: &PaymentSource) -> String {
    match source {
        PaymentSource::Token(token) => format!("token:{}", token),
        PaymentSource::Customer(customer) => format!("customer:{}", customer),
        PaymentSource::Card(_) => "card".to_string(),
    }
}

impl MockPaymentGateway {
    /// Create a new mock gateway with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a plan to the "processor".
    pub fn add_plan(&self, plan: Plan) {
        let id = plan.id.clone();
        self.inner.lock().unwrap().plans.insert(id, plan);
    }

    /// Add a customer to the "processor".
    pub fn add_customer(&self, customer: Customer) {
        let id = customer.id.clone();
        self.inner.lock().unwrap().customers.insert(id, customer);
    }

    /// Add a canonical event that `get_event` will return.
    pub fn add_event(&self, id: &str, event_type: &str, object: Value) {
        let event = Event {
            id: id.to_string(),
            event_type: event_type.to_string(),
            data: EventData { object },
        };
        self.inner
            .lock()
            .unwrap()
            .events
            .insert(id.to_string(), event);
    }

    /// Set the charge to return on the next `create_charge` call.
    pub fn set_next_charge(&self, charge: Charge) {
        self.inner.lock().unwrap().next_charge = Some(charge);
    }

    /// Set the card reported on generated charges and customers.
    pub fn set_card(&self, card: CardDetails) {
        self.inner.lock().unwrap().card = Some(card);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        self.inner.lock().unwrap().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    /// Plans created through `create_plan`, oldest first.
    pub fn created_plans(&self) -> Vec<PlanSpec> {
        self.inner.lock().unwrap().created_plans.clone()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// First argument of every call to `method`, in call order.
    pub fn calls_for(&self, method: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), GatewayError> {
        match self.inner.lock().unwrap().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn customer_with_card(id: String, email: Option<String>, card: CardDetails) -> Customer {
        Customer {
            id,
            email,
            default_source: card.id.clone(),
            sources: Some(CardList { data: vec![card] }),
            default_card: None,
            cards: None,
            active_card: None,
            extra: Map::new(),
        }
    }
}

impl Clone for MockPaymentGateway {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        self.record_call(
            "create_charge",
            vec![request.amount.to_string(), describe_source(&request.source)],
        );
        self.check_error("create_charge")?;

        let mut state = self.inner.lock().unwrap();
        let card = state.card.clone().unwrap_or_else(mock_card);
        let customer = match &request.source {
            PaymentSource::Customer(id) => Some(id.clone()),
            _ => None,
        };

        let charge = state.next_charge.take().unwrap_or_else(|| Charge {
            id: mock_id("ch"),
            amount: request.amount,
            currency: Some(request.currency.clone()),
            customer,
            description: Some(request.description.clone()),
            source: Some(card),
            card: None,
            extra: Map::new(),
        });

        state.charges.insert(charge.id.clone(), charge.clone());
        Ok(charge)
    }

    async fn refund_charge(&self, charge_id: &str) -> Result<Charge, GatewayError> {
        self.record_call("refund_charge", vec![charge_id.to_string()]);
        self.check_error("refund_charge")?;

        let state = self.inner.lock().unwrap();
        let charge = state.charges.get(charge_id).cloned().unwrap_or(Charge {
            id: charge_id.to_string(),
            amount: 0,
            currency: None,
            customer: None,
            description: None,
            source: None,
            card: None,
            extra: Map::new(),
        });
        Ok(charge)
    }

    async fn create_customer(
        &self,
        request: &CreateCustomerRequest,
    ) -> Result<Customer, GatewayError> {
        self.record_call(
            "create_customer",
            vec![describe_source(&request.source), request.email.clone()],
        );
        self.check_error("create_customer")?;

        let mut state = self.inner.lock().unwrap();
        let card = state.card.clone().unwrap_or_else(mock_card);
        let customer = Self::customer_with_card(mock_id("cus"), Some(request.email.clone()), card);

        state
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn update_customer_card(
        &self,
        customer_id: &str,
        token: &str,
    ) -> Result<Customer, GatewayError> {
        self.record_call(
            "update_customer_card",
            vec![customer_id.to_string(), token.to_string()],
        );
        self.check_error("update_customer_card")?;

        let mut state = self.inner.lock().unwrap();
        let card = state.card.clone().unwrap_or_else(mock_card);
        let email = state
            .customers
            .get(customer_id)
            .ok_or_else(|| GatewayError::NotFound(format!("No such customer: {}", customer_id)))?
            .email
            .clone();

        let customer = Self::customer_with_card(customer_id.to_string(), email, card);
        state
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Customer, GatewayError> {
        self.record_call("get_customer", vec![customer_id.to_string()]);
        self.check_error("get_customer")?;

        let state = self.inner.lock().unwrap();
        state
            .customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("No such customer: {}", customer_id)))
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Plan, GatewayError> {
        self.record_call("get_plan", vec![plan_id.to_string()]);
        self.check_error("get_plan")?;

        let state = self.inner.lock().unwrap();
        state
            .plans
            .get(plan_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("No such plan: {}", plan_id)))
    }

    async fn create_plan(&self, spec: &PlanSpec) -> Result<Plan, GatewayError> {
        self.record_call("create_plan", vec![spec.id.clone(), spec.amount.to_string()]);
        self.check_error("create_plan")?;

        let plan = Plan {
            id: spec.id.clone(),
            amount: spec.amount,
            currency: Some(spec.currency.clone()),
            interval: Some(spec.interval),
            interval_count: Some(spec.interval_count),
            trial_period_days: spec.trial_period_days,
        };

        let mut state = self.inner.lock().unwrap();
        state.created_plans.push(spec.clone());
        state.plans.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<ProcessorSubscription, GatewayError> {
        self.record_call(
            "create_subscription",
            vec![request.customer_id.clone(), request.plan_id.clone()],
        );
        self.check_error("create_subscription")?;

        let state = self.inner.lock().unwrap();
        Ok(ProcessorSubscription {
            id: Some(mock_id("sub")),
            customer: request.customer_id.clone(),
            status: Some("active".to_string()),
            plan: state.plans.get(&request.plan_id).cloned(),
        })
    }

    async fn delete_subscription(
        &self,
        customer_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError> {
        self.record_call("delete_subscription", vec![customer_id.to_string()]);
        self.check_error("delete_subscription")?;

        Ok(ProcessorSubscription {
            id: None,
            customer: customer_id.to_string(),
            status: Some("canceled".to_string()),
            plan: None,
        })
    }

    async fn resume_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<ProcessorSubscription, GatewayError> {
        self.record_call(
            "resume_subscription",
            vec![customer_id.to_string(), plan_id.to_string()],
        );
        self.check_error("resume_subscription")?;

        let state = self.inner.lock().unwrap();
        Ok(ProcessorSubscription {
            id: Some(mock_id("sub")),
            customer: customer_id.to_string(),
            status: Some("active".to_string()),
            plan: state.plans.get(plan_id).cloned(),
        })
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, GatewayError> {
        self.record_call("get_event", vec![event_id.to_string()]);
        self.check_error("get_event")?;

        let state = self.inner.lock().unwrap();
        state
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("No such event: {}", event_id)))
    }
}
