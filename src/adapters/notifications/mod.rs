//! Notification dispatcher adapters.
//!
//! - **TracingNotificationDispatcher** - logs each notice; delivery is external
//! - **RecordingNotificationDispatcher** - keeps notices in memory for assertions

mod recording;
mod tracing_dispatcher;

pub use recording::RecordingNotificationDispatcher;
pub use tracing_dispatcher::TracingNotificationDispatcher;
