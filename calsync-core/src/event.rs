//! Local and remote event types.
//!
//! `Event` is the local, authoritative record. `ExternalEvent` is what a
//! provider reports for the same event; it carries no local identity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the current content of a local event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Local,
    Remote,
}

/// Reconciliation bookkeeping for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "at", rename_all = "snake_case")]
pub enum SyncState {
    /// Never confirmed against the remote.
    NeverSynced,
    /// Changed locally since the last confirmed sync; needs a push.
    Dirty,
    /// Believed in sync as of this instant.
    SyncedAt(DateTime<Utc>),
}

impl SyncState {
    /// Local side has changes the remote has not confirmed.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, SyncState::SyncedAt(_))
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SyncState::SyncedAt(at) => Some(*at),
            _ => None,
        }
    }
}

/// User-visible fields of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    /// RRULE body, e.g. `FREQ=WEEKLY;BYDAY=MO`
    pub recurrence: Option<String>,
    /// Minutes before start
    #[serde(default)]
    pub reminders: Vec<i64>,
    pub color: Option<String>,
}

impl EventContent {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        EventContent {
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            recurrence: None,
            reminders: Vec::new(),
            color: None,
        }
    }

    /// Overwrite the fields a provider knows about. Recurrence, reminders and
    /// color are local-only and survive.
    pub fn merge_remote(&mut self, remote: &ExternalEvent) {
        self.title = remote.summary.clone();
        self.description = remote.description.clone();
        self.location = remote.location.clone();
        self.start = remote.start;
        self.end = remote.end;
        self.all_day = remote.all_day;
    }
}

/// A locally stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub user_id: String,
    pub calendar_id: String,
    #[serde(flatten)]
    pub content: EventContent,
    /// People this event is assigned to or affects
    #[serde(default)]
    pub assignees: Vec<String>,
    pub source: EventSource,
    /// Provider's id for this event, once linked
    pub external_id: Option<String>,
    /// Provider's last-modified stamp as seen at the last successful sync
    pub external_updated_at: Option<DateTime<Utc>>,
    pub sync_state: SyncState,
}

impl Event {
    /// A fresh, never-synced local event.
    pub fn new_local(user_id: &str, calendar_id: &str, content: EventContent) -> Self {
        Event {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            calendar_id: calendar_id.to_string(),
            content,
            assignees: Vec::new(),
            source: EventSource::Local,
            external_id: None,
            external_updated_at: None,
            sync_state: SyncState::NeverSynced,
        }
    }

    /// Adopt a remote event that has no local counterpart yet.
    pub fn from_remote(
        user_id: &str,
        calendar_id: &str,
        remote: &ExternalEvent,
        now: DateTime<Utc>,
    ) -> Self {
        let mut content = EventContent::new(remote.summary.clone(), remote.start, remote.end);
        content.merge_remote(remote);

        Event {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            calendar_id: calendar_id.to_string(),
            content,
            assignees: Vec::new(),
            source: EventSource::Remote,
            external_id: Some(remote.id.clone()),
            external_updated_at: Some(remote.updated_at),
            sync_state: SyncState::SyncedAt(now),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.external_id.is_some()
    }

    /// Take the remote's content and record it as the synced baseline.
    pub fn pull_from(&mut self, remote: &ExternalEvent, now: DateTime<Utc>) {
        self.content.merge_remote(remote);
        self.source = EventSource::Remote;
        self.external_id = Some(remote.id.clone());
        self.external_updated_at = Some(remote.updated_at);
        self.sync_state = SyncState::SyncedAt(now);
    }

    /// Record a successful create/update response from the provider.
    pub fn mark_pushed(&mut self, response: &ExternalEvent, now: DateTime<Utc>) {
        self.source = EventSource::Remote;
        self.external_id = Some(response.id.clone());
        self.external_updated_at = Some(response.updated_at);
        self.sync_state = SyncState::SyncedAt(now);
    }

    /// Drop the remote link so the next pass pushes this as a new event.
    pub fn detach(&mut self) {
        self.source = EventSource::Local;
        self.external_id = None;
        self.external_updated_at = None;
        self.sync_state = SyncState::NeverSynced;
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.content.title)
    }
}

/// The provider's view of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Empty when sent for creation
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled: bool,
}

impl ExternalEvent {
    /// Payload for pushing a local event's content.
    pub fn from_local(event: &Event, now: DateTime<Utc>) -> Self {
        let content = &event.content;
        ExternalEvent {
            id: event.external_id.clone().unwrap_or_default(),
            summary: content.title.clone(),
            description: content.description.clone(),
            location: content.location.clone(),
            start: content.start,
            end: content.end,
            all_day: content.all_day,
            updated_at: now,
            cancelled: false,
        }
    }
}

impl fmt::Display for ExternalEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

/// A calendar as listed by a provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCalendar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary: bool,
}
