//! Local persistence seams.
//!
//! The reconciliation code only sees these traits; the storage engine behind
//! them is somebody else's concern.

mod memory;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::calendar_source::CalendarSource;
use crate::date_range::SyncWindow;
use crate::error::CalSyncResult;
use crate::event::Event;

pub use memory::{MemoryEventStore, MemorySourceMap};

/// CRUD plus range queries over local events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events owned by `user_id` in any of `calendar_ids` overlapping `window`.
    async fn events_for_calendars_in_range(
        &self,
        user_id: &str,
        calendar_ids: &[String],
        window: &SyncWindow,
    ) -> CalSyncResult<Vec<Event>>;

    /// Every event of the calendar, whoever owns it and whenever it happens.
    async fn events_in_calendar(&self, calendar_id: &str) -> CalSyncResult<Vec<Event>>;

    async fn get_event(&self, id: &str) -> CalSyncResult<Option<Event>>;

    /// Lookup by provider id regardless of the time window.
    async fn event_by_external_id(
        &self,
        calendar_id: &str,
        external_id: &str,
    ) -> CalSyncResult<Option<Event>>;

    async fn add_event(&self, event: &Event) -> CalSyncResult<()>;

    async fn update_event(&self, event: &Event) -> CalSyncResult<()>;

    async fn delete_event(&self, id: &str) -> CalSyncResult<()>;

    /// Revision counter bumped on every write. Observers re-run their range
    /// query when it changes.
    fn watch(&self) -> watch::Receiver<u64>;
}

/// Which local calendars are linked to which provider calendars.
#[async_trait]
pub trait CalendarSourceMap: Send + Sync {
    async fn source_for_calendar(&self, calendar_id: &str)
    -> CalSyncResult<Option<CalendarSource>>;

    async fn all_sources(&self) -> CalSyncResult<Vec<CalendarSource>>;

    async fn upsert(&self, source: &CalendarSource) -> CalSyncResult<()>;

    /// Returns how many sources were removed.
    async fn delete_by_account(&self, provider: &str, account_id: &str) -> CalSyncResult<usize>;

    /// Returns whether a source existed.
    async fn delete_by_calendar(&self, calendar_id: &str) -> CalSyncResult<bool>;
}
