//! Outbound member notifications.
//!
//! Delivery (templating, email transport) happens outside this crate. The
//! engine only says what happened and to which record; dispatch never fails
//! the calling operation.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{SubscriptionId, TransactionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Receipt,
    CardExpiring,
    Welcome,
    Signup,
    NewSubscription,
    Upgraded,
    Downgraded,
    Cancelled,
    Suspended,
    Resumed,
    PaymentFailed,
    Refunded,
}

/// Record a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NoticeSubject {
    Transaction(TransactionId),
    Subscription(SubscriptionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub user_id: UserId,
    pub subject: NoticeSubject,
}

impl Notice {
    pub fn for_transaction(kind: NoticeKind, user_id: UserId, id: TransactionId) -> Self {
        Self {
            kind,
            user_id,
            subject: NoticeSubject::Transaction(id),
        }
    }

    pub fn for_subscription(kind: NoticeKind, user_id: UserId, id: SubscriptionId) -> Self {
        Self {
            kind,
            user_id,
            subject: NoticeSubject::Subscription(id),
        }
    }
}

/// Fire-and-forget notification sink.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: Notice);
}
