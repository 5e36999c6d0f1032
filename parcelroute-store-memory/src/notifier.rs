//! Notifier that keeps every notification for later inspection.

use std::sync::{Mutex, PoisonError};

use parcelroute_core::{Notification, NotificationPort, NotifyError};

/// Records notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: bool,
}

impl RecordingNotifier {
    /// Notifier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose queue is always closed.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Notifications accepted so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn emit(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::QueueClosed);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}
