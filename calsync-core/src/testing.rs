//! In-process doubles for exercising reconciliation without a provider.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::calendar_source::{CalendarSource, RemoteCalendarRef};
use crate::clock::{Clock, FixedClock};
use crate::context::SyncContext;
use crate::date_range::SyncWindow;
use crate::event::{Event, EventContent, ExternalCalendar, ExternalEvent};
use crate::notify::NoopNotifier;
use crate::remote::RemoteGateway;
use crate::store::{CalendarSourceMap, MemoryEventStore, MemorySourceMap};
use crate::sync::conflict::ConflictSurface;
use crate::sync::orchestrator::SyncOrchestrator;
use crate::sync::resolver::ConflictResolver;
use crate::write::EventWriter;

pub const PROVIDER: &str = "mock";
pub const ACCOUNT: &str = "me@example.com";
pub const USER: &str = "me";

/// 2025-01-01T00:00:00Z
const STAMP_BASE: i64 = 1_735_689_600;
/// 2025-03-10T12:00:00Z
const NOW: i64 = 1_741_608_000;

/// Scriptable provider. Each write stamps the event with a fresh
/// `updated_at`, strictly later than every stamp handed out before.
#[derive(Default)]
pub struct MockGateway {
    calendars: Mutex<HashMap<(String, String), Vec<ExternalCalendar>>>,
    events: Mutex<HashMap<RemoteCalendarRef, BTreeMap<String, ExternalEvent>>>,
    offline: Mutex<bool>,
    fail_writes: Mutex<bool>,
    failing_calendars: Mutex<HashSet<RemoteCalendarRef>>,
    revoked: Mutex<HashSet<(String, String)>>,
    listing_gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
    stamp: AtomicU64,
}

/// Where the mock lives for a given calendar id.
pub fn remote_ref(calendar_id: &str) -> RemoteCalendarRef {
    RemoteCalendarRef {
        provider: PROVIDER.to_string(),
        account_id: ACCOUNT.to_string(),
        calendar_id: calendar_id.to_string(),
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stamp later than every earlier one.
    pub fn next_stamp(&self) -> DateTime<Utc> {
        let n = self.stamp.fetch_add(1, Ordering::SeqCst) as i64;
        DateTime::from_timestamp(STAMP_BASE + n + 1, 0).unwrap_or_default()
    }

    fn next_id(&self) -> String {
        format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn add_calendar(&self, provider: &str, account_id: &str, id: &str, name: &str) {
        self.calendars
            .lock()
            .entry((provider.to_string(), account_id.to_string()))
            .or_default()
            .push(ExternalCalendar {
                id: id.to_string(),
                name: name.to_string(),
                primary: false,
            });
    }

    /// Put an event on the remote side as if another client created it.
    pub fn insert(&self, calendar: &RemoteCalendarRef, title: &str, start: DateTime<Utc>) -> ExternalEvent {
        let event = ExternalEvent {
            id: self.next_id(),
            summary: title.to_string(),
            description: None,
            location: None,
            start,
            end: start + Duration::hours(1),
            all_day: false,
            updated_at: self.next_stamp(),
            cancelled: false,
        };
        self.events
            .lock()
            .entry(calendar.clone())
            .or_default()
            .insert(event.id.clone(), event.clone());
        event
    }

    pub fn event(&self, calendar: &RemoteCalendarRef, id: &str) -> Option<ExternalEvent> {
        self.events.lock().get(calendar)?.get(id).cloned()
    }

    pub fn events(&self, calendar: &RemoteCalendarRef) -> Vec<ExternalEvent> {
        self.events
            .lock()
            .get(calendar)
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Edit from another client; bumps `updated_at`.
    pub fn edit(&self, calendar: &RemoteCalendarRef, id: &str, f: impl FnOnce(&mut ExternalEvent)) {
        let stamp = self.next_stamp();
        if let Some(event) = self.events.lock().get_mut(calendar).and_then(|e| e.get_mut(id)) {
            f(event);
            event.updated_at = stamp;
        }
    }

    /// Mark cancelled; it keeps showing up in listings.
    pub fn cancel(&self, calendar: &RemoteCalendarRef, id: &str) {
        self.edit(calendar, id, |e| e.cancelled = true);
    }

    /// Hard delete; it disappears from listings.
    pub fn remove(&self, calendar: &RemoteCalendarRef, id: &str) {
        if let Some(events) = self.events.lock().get_mut(calendar) {
            events.remove(id);
        }
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Listings keep working; creates, updates and deletes fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Every call against this one calendar fails.
    pub fn fail_calendar(&self, calendar: &RemoteCalendarRef) {
        self.failing_calendars.lock().insert(calendar.clone());
    }

    pub fn revoke(&self, provider: &str, account_id: &str) {
        self.revoked
            .lock()
            .insert((provider.to_string(), account_id.to_string()));
    }

    /// Event listings block until the returned semaphore gets permits.
    pub fn hold_listings(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.listing_gate.lock() = Some(gate.clone());
        gate
    }

    /// Log of calls, e.g. `create:work`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| !c.starts_with("list"))
            .count()
    }

    fn log(&self, call: &str, calendar: &str) {
        self.calls.lock().push(format!("{}:{}", call, calendar));
    }

    fn reachable(&self, calendar: &RemoteCalendarRef) -> bool {
        !*self.offline.lock() && !self.failing_calendars.lock().contains(calendar)
    }

    fn writable(&self, calendar: &RemoteCalendarRef) -> bool {
        self.reachable(calendar) && !*self.fail_writes.lock()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn list_calendars(&self, provider: &str, account_id: &str) -> Option<Vec<ExternalCalendar>> {
        self.log("list_calendars", account_id);
        if *self.offline.lock() {
            return None;
        }
        Some(
            self.calendars
                .lock()
                .get(&(provider.to_string(), account_id.to_string()))
                .cloned()
                .unwrap_or_default(),
        )
    }

    async fn list_events(
        &self,
        calendar: &RemoteCalendarRef,
        window: &SyncWindow,
    ) -> Option<Vec<ExternalEvent>> {
        self.log("list", &calendar.calendar_id);

        let gate = self.listing_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.ok()?;
        }

        if !self.reachable(calendar) {
            return None;
        }
        Some(
            self.events(calendar)
                .into_iter()
                .filter(|e| window.overlaps(e.start, e.end))
                .collect(),
        )
    }

    async fn create_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent> {
        self.log("create", &calendar.calendar_id);
        if !self.writable(calendar) {
            return None;
        }
        let mut created = event.clone();
        created.id = self.next_id();
        created.updated_at = self.next_stamp();
        self.events
            .lock()
            .entry(calendar.clone())
            .or_default()
            .insert(created.id.clone(), created.clone());
        Some(created)
    }

    async fn update_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent> {
        self.log("update", &calendar.calendar_id);
        if !self.writable(calendar) {
            return None;
        }
        let stamp = self.next_stamp();
        let mut events = self.events.lock();
        let stored = events.get_mut(calendar)?.get_mut(&event.id)?;
        *stored = event.clone();
        stored.updated_at = stamp;
        Some(stored.clone())
    }

    async fn delete_event(&self, calendar: &RemoteCalendarRef, event_id: &str) -> bool {
        self.log("delete", &calendar.calendar_id);
        if !self.writable(calendar) {
            return false;
        }
        self.events
            .lock()
            .get_mut(calendar)
            .is_some_and(|events| events.remove(event_id).is_some())
    }

    async fn has_credentials(&self, provider: &str, account_id: &str) -> bool {
        !self
            .revoked
            .lock()
            .contains(&(provider.to_string(), account_id.to_string()))
    }
}

/// Memory stores, a mock provider and a frozen clock wired into one context.
pub struct Harness {
    pub store: Arc<MemoryEventStore>,
    pub sources: Arc<MemorySourceMap>,
    pub gateway: Arc<MockGateway>,
    pub conflicts: Arc<ConflictSurface>,
    pub clock: Arc<FixedClock>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            store: Arc::new(MemoryEventStore::new()),
            sources: Arc::new(MemorySourceMap::new()),
            gateway: Arc::new(MockGateway::new()),
            conflicts: Arc::new(ConflictSurface::new()),
            clock: Arc::new(FixedClock::new(
                DateTime::from_timestamp(NOW, 0).unwrap_or_default(),
            )),
        }
    }

    pub fn ctx(&self) -> SyncContext {
        SyncContext {
            store: self.store.clone(),
            sources: self.sources.clone(),
            gateway: self.gateway.clone(),
            conflicts: self.conflicts.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Link local calendar `calendar_id` to the mock calendar of the same id.
    pub async fn link(&self, calendar_id: &str) -> CalendarSource {
        let source = CalendarSource::new(calendar_id, PROVIDER, ACCOUNT, calendar_id);
        self.sources
            .upsert(&source)
            .await
            .unwrap_or_else(|e| panic!("memory source map rejected upsert: {e}"));
        source
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.ctx(), USER)
    }

    pub fn resolver(&self) -> ConflictResolver {
        ConflictResolver::new(self.ctx())
    }

    pub fn writer(&self) -> EventWriter {
        EventWriter::new(self.ctx(), Arc::new(NoopNotifier), Arc::new(NoopNotifier))
    }

    /// `hours` from the frozen now.
    pub fn at(&self, hours: i64) -> DateTime<Utc> {
        self.clock.now() + Duration::hours(hours)
    }

    /// A never-synced local event one hour long.
    pub fn local(&self, calendar_id: &str, title: &str, hours: i64) -> Event {
        let start = self.at(hours);
        Event::new_local(
            USER,
            calendar_id,
            EventContent::new(title, start, start + Duration::hours(1)),
        )
    }

    pub fn stored(&self, id: &str) -> Option<Event> {
        self.store.all().into_iter().find(|e| e.id == id)
    }

    pub fn stored_by_external_id(&self, external_id: &str) -> Option<Event> {
        self.store
            .all()
            .into_iter()
            .find(|e| e.external_id.as_deref() == Some(external_id))
    }
}
