//! Domain layer.
//!
//! Pure ledger types and rules with no I/O.

pub mod billing;
pub mod foundation;
