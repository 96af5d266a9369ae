//! State machine trait for ledger status enums.
//!
//! Transaction and subscription statuses both move through a fixed set of
//! transitions. Implementors list the allowed edges; callers get checked
//! transitions and terminal-state detection.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// ```ignore
/// let next = TransactionStatus::Pending.transition_to(TransactionStatus::Complete)?;
/// assert!(TransactionStatus::Refunded.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
