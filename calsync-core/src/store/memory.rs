//! In-memory store implementations, used for embedding and in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::calendar_source::CalendarSource;
use crate::date_range::SyncWindow;
use crate::error::CalSyncResult;
use crate::event::Event;
use crate::store::{CalendarSourceMap, EventStore};

pub struct MemoryEventStore {
    events: Mutex<BTreeMap<String, Event>>,
    revision: watch::Sender<u64>,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        MemoryEventStore {
            events: Mutex::new(BTreeMap::new()),
            revision,
        }
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let store = Self::new();
        store
            .events
            .lock()
            .extend(events.into_iter().map(|e| (e.id.clone(), e)));
        store
    }

    /// Every stored event, ordered by id.
    pub fn all(&self) -> Vec<Event> {
        self.events.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn events_for_calendars_in_range(
        &self,
        user_id: &str,
        calendar_ids: &[String],
        window: &SyncWindow,
    ) -> CalSyncResult<Vec<Event>> {
        let events = self.events.lock();
        Ok(events
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| calendar_ids.contains(&e.calendar_id))
            .filter(|e| window.overlaps(e.content.start, e.content.end))
            .cloned()
            .collect())
    }

    async fn events_in_calendar(&self, calendar_id: &str) -> CalSyncResult<Vec<Event>> {
        Ok(self
            .events
            .lock()
            .values()
            .filter(|e| e.calendar_id == calendar_id)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: &str) -> CalSyncResult<Option<Event>> {
        Ok(self.events.lock().get(id).cloned())
    }

    async fn event_by_external_id(
        &self,
        calendar_id: &str,
        external_id: &str,
    ) -> CalSyncResult<Option<Event>> {
        Ok(self
            .events
            .lock()
            .values()
            .find(|e| {
                e.calendar_id == calendar_id && e.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn add_event(&self, event: &Event) -> CalSyncResult<()> {
        self.events.lock().insert(event.id.clone(), event.clone());
        self.bump();
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> CalSyncResult<()> {
        self.events.lock().insert(event.id.clone(), event.clone());
        self.bump();
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> CalSyncResult<()> {
        if self.events.lock().remove(id).is_some() {
            self.bump();
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[derive(Default)]
pub struct MemorySourceMap {
    sources: Mutex<BTreeMap<String, CalendarSource>>,
}

impl MemorySourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = CalendarSource>) -> Self {
        let map = Self::new();
        map.sources
            .lock()
            .extend(sources.into_iter().map(|s| (s.calendar_id.clone(), s)));
        map
    }
}

#[async_trait]
impl CalendarSourceMap for MemorySourceMap {
    async fn source_for_calendar(
        &self,
        calendar_id: &str,
    ) -> CalSyncResult<Option<CalendarSource>> {
        Ok(self.sources.lock().get(calendar_id).cloned())
    }

    async fn all_sources(&self) -> CalSyncResult<Vec<CalendarSource>> {
        Ok(self.sources.lock().values().cloned().collect())
    }

    async fn upsert(&self, source: &CalendarSource) -> CalSyncResult<()> {
        self.sources
            .lock()
            .insert(source.calendar_id.clone(), source.clone());
        Ok(())
    }

    async fn delete_by_account(&self, provider: &str, account_id: &str) -> CalSyncResult<usize> {
        let mut sources = self.sources.lock();
        let before = sources.len();
        sources.retain(|_, s| !(s.provider == provider && s.provider_account_id == account_id));
        Ok(before - sources.len())
    }

    async fn delete_by_calendar(&self, calendar_id: &str) -> CalSyncResult<bool> {
        Ok(self.sources.lock().remove(calendar_id).is_some())
    }
}
