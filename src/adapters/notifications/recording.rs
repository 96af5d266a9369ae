//! Notice sink that remembers what it was asked to send.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::ports::{Notice, NoticeKind, NotificationDispatcher};

#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationDispatcher {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice dispatched so far, in order.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices().into_iter().map(|n| n.kind).collect()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices().iter().filter(|n| n.kind == kind).count()
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotificationDispatcher {
    async fn dispatch(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
