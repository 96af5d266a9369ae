//! Adapters - Implementations of port interfaces.
//!
//! - `stripe` - Processor HTTP client, gateway and test double
//! - `storage` - In-memory ledgers and catalog
//! - `notifications` - Notice dispatchers
//! - `http` - Webhook and health endpoints

pub mod http;
pub mod notifications;
pub mod storage;
pub mod stripe;
