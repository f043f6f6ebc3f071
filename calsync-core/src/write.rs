//! Interactive create/update/delete of single events.
//!
//! A create or update never fails because the provider is unreachable: the
//! event is stored dirty and the next sync pass pushes it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::calendar_source::CalendarSource;
use crate::config::RemoteDeletePolicy;
use crate::context::SyncContext;
use crate::error::{CalSyncError, CalSyncResult, ValidationError};
use crate::event::{Event, EventSource, ExternalEvent, SyncState};
use crate::notify::{CacheRefresher, ReminderScheduler};

/// Checks that run before anything is stored or sent.
pub fn validate(event: &Event) -> Result<(), ValidationError> {
    if event.content.title.trim().is_empty() {
        return Err(ValidationError::BlankTitle);
    }
    if event.calendar_id.trim().is_empty() {
        return Err(ValidationError::BlankCalendarId);
    }
    if !event.content.all_day && event.content.start > event.content.end {
        return Err(ValidationError::EndBeforeStart);
    }
    Ok(())
}

pub struct EventWriter {
    ctx: SyncContext,
    delete_policy: RemoteDeletePolicy,
    reminders: Arc<dyn ReminderScheduler>,
    cache: Arc<dyn CacheRefresher>,
}

impl EventWriter {
    pub fn new(
        ctx: SyncContext,
        reminders: Arc<dyn ReminderScheduler>,
        cache: Arc<dyn CacheRefresher>,
    ) -> Self {
        EventWriter {
            ctx,
            delete_policy: RemoteDeletePolicy::default(),
            reminders,
            cache,
        }
    }

    pub fn with_delete_policy(mut self, policy: RemoteDeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub async fn create(&self, mut event: Event) -> CalSyncResult<Event> {
        validate(&event)?;

        event.external_id = None;
        event.external_updated_at = None;
        event.sync_state = SyncState::NeverSynced;

        let source = self.active_source(&event.calendar_id).await?;
        self.push(&mut event, source.as_ref()).await;

        self.ctx.store.add_event(&event).await?;
        self.after_write(&event);

        info!(event_id = %event.id, calendar_id = %event.calendar_id, source = ?event.source, "event created");
        Ok(event)
    }

    /// Replace an event's content. Remote linkage is taken from the stored
    /// copy, not from the caller.
    pub async fn update(&self, mut event: Event) -> CalSyncResult<Event> {
        validate(&event)?;

        let existing = self
            .ctx
            .store
            .get_event(&event.id)
            .await?
            .ok_or_else(|| CalSyncError::EventNotFound(event.id.clone()))?;

        event.source = existing.source;
        event.external_id = existing.external_id.clone();
        event.external_updated_at = existing.external_updated_at;
        event.sync_state = existing.sync_state;

        if existing.calendar_id != event.calendar_id {
            self.leave_calendar(&existing).await;
            event.detach();
        }

        let source = self.active_source(&event.calendar_id).await?;
        self.push(&mut event, source.as_ref()).await;

        self.ctx.store.update_event(&event).await?;
        self.after_write(&event);

        info!(event_id = %event.id, calendar_id = %event.calendar_id, state = ?event.sync_state, "event updated");
        Ok(event)
    }

    pub async fn delete(&self, event_id: &str) -> CalSyncResult<()> {
        let event = self
            .ctx
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| CalSyncError::EventNotFound(event_id.to_string()))?;

        if let Some(external_id) = &event.external_id {
            let source = self
                .ctx
                .sources
                .source_for_calendar(&event.calendar_id)
                .await?;

            if let Some(source) = source {
                let deleted = self
                    .ctx
                    .gateway
                    .delete_event(&source.remote_ref(), external_id)
                    .await;

                if !deleted {
                    match self.delete_policy {
                        RemoteDeletePolicy::FailClosed => {
                            warn!(%event_id, %external_id, "remote delete failed, keeping event");
                            return Err(CalSyncError::RemoteDeleteFailed(event_id.to_string()));
                        }
                        RemoteDeletePolicy::FailOpen => {
                            warn!(%event_id, %external_id, "remote delete failed, deleting locally anyway");
                        }
                    }
                }
            }
        }

        self.ctx.store.delete_event(event_id).await?;
        self.reminders.cancel(event_id);
        self.cache.refresh(&event.calendar_id);

        info!(%event_id, calendar_id = %event.calendar_id, "event deleted");
        Ok(())
    }

    /// The calendar's source if it exists. `None` means a purely local
    /// calendar.
    async fn active_source(&self, calendar_id: &str) -> CalSyncResult<Option<CalendarSource>> {
        self.ctx.sources.source_for_calendar(calendar_id).await
    }

    /// Try to mirror the event remotely right away; on failure leave it
    /// marked for the next pass.
    async fn push(&self, event: &mut Event, source: Option<&CalendarSource>) {
        let Some(source) = source else {
            event.source = EventSource::Local;
            return;
        };

        event.source = EventSource::Remote;

        if !source.sync_enabled {
            event.sync_state = SyncState::Dirty;
            return;
        }

        let now = self.ctx.clock.now();
        let payload = ExternalEvent::from_local(event, now);
        let remote_ref = source.remote_ref();

        let response = if event.is_linked() {
            self.ctx.gateway.update_event(&remote_ref, &payload).await
        } else {
            self.ctx.gateway.create_event(&remote_ref, &payload).await
        };

        match response {
            Some(response) => event.mark_pushed(&response, now),
            None => {
                info!(event_id = %event.id, "provider unreachable, event queued for next sync");
                event.sync_state = SyncState::Dirty;
            }
        }
    }

    /// Best-effort removal of the remote copy when an event moves to
    /// another calendar.
    async fn leave_calendar(&self, existing: &Event) {
        let Some(external_id) = &existing.external_id else {
            return;
        };

        match self
            .ctx
            .sources
            .source_for_calendar(&existing.calendar_id)
            .await
        {
            Ok(Some(source)) => {
                if !self
                    .ctx
                    .gateway
                    .delete_event(&source.remote_ref(), external_id)
                    .await
                {
                    warn!(event_id = %existing.id, %external_id, "old remote copy not deleted");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(event_id = %existing.id, error = %e, "could not look up old calendar"),
        }
    }

    fn after_write(&self, event: &Event) {
        self.reminders.schedule(event);
        self.cache.refresh(&event.calendar_id);
    }
}
