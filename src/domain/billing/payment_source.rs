//! Payment source selection for checkout.

use secrecy::SecretString;

use crate::domain::foundation::ValidationError;

/// Raw card fields posted by a checkout form.
#[derive(Debug, Clone)]
pub struct CardInput {
    pub number: SecretString,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: SecretString,
}

/// The one source a charge or customer is created from.
#[derive(Debug, Clone)]
pub enum PaymentSource {
    /// Single-use token from the processor's client library.
    Token(String),
    /// Existing processor customer.
    Customer(String),
    /// Raw card data.
    Card(CardInput),
}

/// Everything a checkout request may carry about how to pay.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    pub token: Option<String>,
    pub customer: Option<String>,
    pub card: Option<CardInput>,
    pub client_ip: Option<String>,
}

impl PaymentDetails {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn with_customer(customer: impl Into<String>) -> Self {
        Self {
            customer: Some(customer.into()),
            ..Default::default()
        }
    }

    pub fn with_card(card: CardInput) -> Self {
        Self {
            card: Some(card),
            ..Default::default()
        }
    }

    /// Picks token, then customer, then card.
    pub fn charge_source(&self) -> Result<PaymentSource, ValidationError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(PaymentSource::Token(token.clone()));
        }
        if let Some(customer) = self.customer.as_ref().filter(|c| !c.is_empty()) {
            return Ok(PaymentSource::Customer(customer.clone()));
        }
        self.card_source()
    }

    /// Picks token, then card. Used where a new customer must be created.
    pub fn customer_source(&self) -> Result<PaymentSource, ValidationError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(PaymentSource::Token(token.clone()));
        }
        self.card_source()
    }

    fn card_source(&self) -> Result<PaymentSource, ValidationError> {
        self.card
            .clone()
            .map(PaymentSource::Card)
            .ok_or_else(|| ValidationError::empty_field("payment_source"))
    }
}
