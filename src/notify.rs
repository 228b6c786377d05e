//! Notification dispatch.
//!
//! Enqueueing is transactional with the mutation that caused it (see the
//! task layer); dispatch here is fire-and-forget. A sink failure is logged
//! and swallowed, never propagated into the parent mutation.

use crate::types::Notification;
use anyhow::Result;
use tracing::{debug, warn};

/// Delivery backend for enqueued notifications (email bridge, in-app bell).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Default sink: logs deliveries instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        debug!(
            recipient = %notification.user_id,
            kind = notification.kind.as_str(),
            "notification: {}",
            notification.message
        );
        Ok(())
    }
}

/// Hand every enqueued notification to the sink, absorbing failures.
pub fn dispatch_all(sink: &dyn NotificationSink, notifications: &[Notification]) {
    for notification in notifications {
        if let Err(err) = sink.deliver(notification) {
            warn!(
                recipient = %notification.user_id,
                "notification delivery failed: {:#}",
                err
            );
        }
    }
}
