//! Results of idempotent record operations.

/// Outcome of a `record_*` call.
///
/// Re-delivery of an already-applied event is a success, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome<T> {
    /// State changed; carries the stored record.
    Applied(T),
    /// The record already reflected this event.
    AlreadyApplied,
    /// No local record matches the processor reference.
    NoMatch,
}

impl<T> RecordOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, RecordOutcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            RecordOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RecordOutcome<U> {
        match self {
            RecordOutcome::Applied(value) => RecordOutcome::Applied(f(value)),
            RecordOutcome::AlreadyApplied => RecordOutcome::AlreadyApplied,
            RecordOutcome::NoMatch => RecordOutcome::NoMatch,
        }
    }
}
