//! Storage Adapters
//!
//! In-memory implementations of the ledger and catalog ports.
//!
//! ## Available Adapters
//!
//! - **InMemoryTransactionLedger** - transactions keyed by id, unique processor charge ids
//! - **InMemorySubscriptionLedger** - subscriptions keyed by id
//! - **InMemoryCatalog** - products and members (read-only to the engine)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{InMemoryCatalog, InMemoryTransactionLedger};
//!
//! let transactions = InMemoryTransactionLedger::new();
//! let catalog = InMemoryCatalog::new();
//! catalog.add_product(product).await;
//! ```

mod in_memory_catalog;
mod in_memory_ledger;

pub use in_memory_catalog::InMemoryCatalog;
pub use in_memory_ledger::{InMemorySubscriptionLedger, InMemoryTransactionLedger};
