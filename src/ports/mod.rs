//! Ports - Interfaces between the billing services and the outside world.
//!
//! # Ports
//!
//! - `PaymentGateway` - Typed operations against the card processor
//! - `TransactionLedger` / `SubscriptionLedger` - Record persistence
//! - `CatalogReader` - Products and member contact details
//! - `NotificationDispatcher` - Fire-and-forget member notices

mod catalog;
mod ledger;
mod notification_dispatcher;
mod payment_gateway;
mod processor_records;

pub use catalog::{CatalogReader, Member};
pub use ledger::{LedgerError, SubscriptionLedger, TransactionLedger};
pub use notification_dispatcher::{Notice, NoticeKind, NoticeSubject, NotificationDispatcher};
pub use payment_gateway::{
    ChargeRequest, CreateCustomerRequest, CreateSubscriptionRequest, GatewayError, PaymentGateway,
};
pub use processor_records::{
    CardDetails, CardList, Charge, Customer, Event, EventData, EventKind, Plan,
    ProcessorSubscription, WebhookNotification,
};
