//! The seam between reconciliation and a calendar provider.

use async_trait::async_trait;

use crate::calendar_source::RemoteCalendarRef;
use crate::date_range::SyncWindow;
use crate::event::{ExternalCalendar, ExternalEvent};

/// Remote calendar operations.
///
/// Implementations never return errors: any failure, including a timeout,
/// comes back as `None`/`false`, meaning "try again later". Callers must not
/// read a failure as "nothing changed".
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_calendars(&self, provider: &str, account_id: &str)
    -> Option<Vec<ExternalCalendar>>;

    /// `None` is a failed listing, not an empty calendar.
    async fn list_events(
        &self,
        calendar: &RemoteCalendarRef,
        window: &SyncWindow,
    ) -> Option<Vec<ExternalEvent>>;

    async fn create_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent>;

    async fn update_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent>;

    async fn delete_event(&self, calendar: &RemoteCalendarRef, event_id: &str) -> bool;

    /// Whether the account can currently be used at all.
    async fn has_credentials(&self, _provider: &str, _account_id: &str) -> bool {
        true
    }
}
