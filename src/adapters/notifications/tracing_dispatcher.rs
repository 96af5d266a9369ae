//! Notice sink that writes each notice to the log.

use async_trait::async_trait;

use crate::ports::{Notice, NoticeSubject, NotificationDispatcher};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationDispatcher;

impl TracingNotificationDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn dispatch(&self, notice: Notice) {
        let subject = match notice.subject {
            NoticeSubject::Transaction(id) => format!("transaction:{}", id),
            NoticeSubject::Subscription(id) => format!("subscription:{}", id),
        };
        tracing::info!(
            kind = ?notice.kind,
            user_id = %notice.user_id,
            subject = %subject,
            "Member notice dispatched"
        );
    }
}
