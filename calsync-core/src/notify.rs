//! Side-effect collaborators fired after successful local writes.
//!
//! These are not part of the write's contract: they cannot fail the write
//! and are called after the store has accepted it.

use tracing::debug;

use crate::event::Event;

pub trait ReminderScheduler: Send + Sync {
    fn schedule(&self, event: &Event);
    fn cancel(&self, event_id: &str);
}

pub trait CacheRefresher: Send + Sync {
    fn refresh(&self, calendar_id: &str);
}

/// Does nothing but leave a trace, for hosts with no reminder or cache layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReminderScheduler for NoopNotifier {
    fn schedule(&self, event: &Event) {
        debug!(event_id = %event.id, reminders = ?event.content.reminders, "reminders not scheduled");
    }

    fn cancel(&self, event_id: &str) {
        debug!(%event_id, "reminders not cancelled");
    }
}

impl CacheRefresher for NoopNotifier {
    fn refresh(&self, calendar_id: &str) {
        debug!(%calendar_id, "cache refresh skipped");
    }
}
