//! WebhookReconciler - turns inbound processor notifications into ledger
//! updates.
//!
//! The inbound body is trusted for nothing but the event id. The canonical
//! event is re-fetched from the processor and routed to the matching
//! `record_*` routine.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::ports::{
    Charge, Event, EventKind, PaymentGateway, ProcessorSubscription, WebhookNotification,
};

use super::payment_processor::PaymentProcessor;
use super::subscription_lifecycle::{CancelOptions, SubscriptionLifecycleManager};

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Body unusable or event not retrievable; the processor will retry.
    Dropped,
    /// Event fetched but nothing to record for its type.
    Ignored { event_id: String, event_type: String },
    /// Event routed to a record routine. `applied` is false when the ledger
    /// already reflected it or nothing matched.
    Recorded {
        event_id: String,
        event_type: String,
        applied: bool,
    },
}

pub struct WebhookReconciler {
    gateway: Arc<dyn PaymentGateway>,
    processor: Arc<PaymentProcessor>,
    lifecycle: Arc<SubscriptionLifecycleManager>,
}

impl WebhookReconciler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        processor: Arc<PaymentProcessor>,
        lifecycle: Arc<SubscriptionLifecycleManager>,
    ) -> Self {
        Self {
            gateway,
            processor,
            lifecycle,
        }
    }

    pub async fn handle(&self, payload: &[u8]) -> Result<ReconcileOutcome, BillingError> {
        let Some(event_id) = WebhookNotification::event_id(payload) else {
            tracing::warn!(bytes = payload.len(), "Dropping webhook without event id");
            return Ok(ReconcileOutcome::Dropped);
        };

        let event = match self.gateway.get_event(&event_id).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Dropping webhook, event fetch failed");
                return Ok(ReconcileOutcome::Dropped);
            }
        };

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Reconciling processor event");
        self.dispatch(event).await
    }

    async fn dispatch(&self, event: Event) -> Result<ReconcileOutcome, BillingError> {
        let applied = match event.kind() {
            EventKind::ChargeSucceeded => {
                let charge: Charge = event.object()?;
                if !is_recurring_charge(&charge) {
                    return Ok(ignored(event));
                }
                self.processor
                    .record_subscription_payment(&charge)
                    .await?
                    .is_applied()
            }
            EventKind::ChargeFailed => {
                let charge: Charge = event.object()?;
                self.processor
                    .record_payment_failure(&charge)
                    .await?
                    .is_applied()
            }
            EventKind::ChargeRefunded => {
                let charge: Charge = event.object()?;
                self.processor.record_refund(&charge).await?.is_applied()
            }
            EventKind::SubscriptionDeleted => {
                let deleted: ProcessorSubscription = event.object()?;
                self.lifecycle
                    .record_cancel_subscription(&deleted, CancelOptions::default())
                    .await?
                    .is_applied()
            }
            EventKind::ChargeDisputed
            | EventKind::SubscriptionCreated
            | EventKind::SubscriptionUpdated
            | EventKind::TrialWillEnd
            | EventKind::Unknown(_) => return Ok(ignored(event)),
        };

        tracing::info!(event_id = %event.id, event_type = %event.event_type, applied, "Processor event recorded");
        Ok(ReconcileOutcome::Recorded {
            event_id: event.id,
            event_type: event.event_type,
            applied,
        })
    }
}

/// Charges the processor makes on a subscription's schedule carry a customer
/// and no description. Checkout charges always carry a description and are
/// recorded synchronously.
fn is_recurring_charge(charge: &Charge) -> bool {
    let described = charge
        .description
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    charge.customer.is_some() && !described
}

fn ignored(event: Event) -> ReconcileOutcome {
    tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring processor event");
    ReconcileOutcome::Ignored {
        event_id: event.id,
        event_type: event.event_type,
    }
}
