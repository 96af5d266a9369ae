//! Billing reconciler service.
//!
//! Loads configuration, wires the billing services to the processor gateway
//! and serves the webhook endpoint.

use std::sync::Arc;
use std::time::Duration;

use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use billing_reconciler::adapters::http::{webhook_router, WebhookAppState};
use billing_reconciler::adapters::notifications::TracingNotificationDispatcher;
use billing_reconciler::adapters::storage::{
    InMemoryCatalog, InMemorySubscriptionLedger, InMemoryTransactionLedger,
};
use billing_reconciler::adapters::stripe::StripeGateway;
use billing_reconciler::application::{
    BillingContext, BillingSettings, PaymentProcessor, SubscriptionLifecycleManager,
    WebhookReconciler,
};
use billing_reconciler::config::AppConfig;
use billing_reconciler::ports::PaymentGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(&config.processor)?);
    let ctx = BillingContext::new(
        gateway.clone(),
        Arc::new(InMemoryTransactionLedger::new()),
        Arc::new(InMemorySubscriptionLedger::new()),
        Arc::new(InMemoryCatalog::new()),
        Arc::new(TracingNotificationDispatcher::new()),
        BillingSettings::from(&config.billing),
    );
    let lifecycle = Arc::new(SubscriptionLifecycleManager::new(ctx.clone()));
    let processor = Arc::new(PaymentProcessor::new(ctx, lifecycle.clone()));
    let reconciler = Arc::new(WebhookReconciler::new(gateway, processor, lifecycle));

    let app = webhook_router()
        .with_state(WebhookAppState::new(reconciler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        test_mode = config.processor.is_test_mode(),
        currency = %config.billing.currency_code,
        "Billing reconciler listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
