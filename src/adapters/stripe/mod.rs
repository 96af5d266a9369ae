//! Card processor adapter.
//!
//! Implements the `PaymentGateway` port against a Stripe-style REST API:
//! - `client` - authenticated form-encoded request/response wrapper
//! - `stripe_gateway` - typed endpoint calls over the client
//! - `mock_payment_gateway` - in-process gateway for tests
//!
//! # Security
//!
//! - The secret key is held as `secrecy::SecretString` and sent only as
//!   HTTP Basic credentials
//! - Webhook bodies are never trusted beyond their event id
//!
//! # Configuration
//!
//! Required environment variables:
//! - `RECONCILER__PROCESSOR__SECRET_KEY`: processor secret API key

mod client;
mod mock_payment_gateway;
mod stripe_gateway;

pub use client::{FormBody, GatewayClient, HttpMethod, RequestEnvelope, ResponseResult};
pub use mock_payment_gateway::{mock_card, MethodCall, MockPaymentGateway};
pub use stripe_gateway::StripeGateway;
