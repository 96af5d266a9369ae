//! Billing domain module.
//!
//! Ledger entities and the pure rules the reconciliation services apply.
//!
//! # Module Structure
//!
//! - `transaction` / `subscription` - Ledger entities
//! - `status` - Transaction and subscription state machines
//! - `currency` - Minor-unit amount encoding
//! - `product` / `change` - Catalog view and upgrade classification
//! - `plan` - Recurring plan derivation
//! - `payment_source` - Checkout payment source selection

mod change;
mod currency;
mod errors;
mod outcome;
mod payment_source;
mod plan;
mod product;
mod status;
mod subscription;
mod transaction;

pub use change::ChangeKind;
pub use currency::{is_zero_decimal, CurrencyCodec};
pub use errors::BillingError;
pub use outcome::RecordOutcome;
pub use payment_source::{CardInput, PaymentDetails, PaymentSource};
pub use plan::{new_plan_id, PlanSpec};
pub use product::{BillingInterval, BillingPeriod, Product, ProductGroup};
pub use status::{SubscriptionStatus, TransactionStatus, TransactionType};
pub use subscription::{CardSummary, CycleLimit, CycleLimitAction, Subscription, TrialTerms};
pub use transaction::Transaction;
