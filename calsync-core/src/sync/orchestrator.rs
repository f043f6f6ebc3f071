//! Drives reconciliation passes over every linked calendar.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::calendar_source::{CalendarSource, RemoteCalendarRef};
use crate::config::{BackgroundConflictPolicy, SyncConfig};
use crate::context::SyncContext;
use crate::date_range::{DEFAULT_FUTURE_MONTHS, DEFAULT_PAST_DAYS, SyncWindow};
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, ExternalEvent, SyncState};
use crate::sync::classifier::{ChangeKind, classify, is_orphan};
use crate::sync::conflict::SyncConflict;
use crate::sync::report::{SourceOutcome, SourceStatus, SyncReport};

/// Who asked for the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// User-initiated; publishes its conflicts, superseding older ones.
    Manual,
    /// Scheduled; conflict publication follows `BackgroundConflictPolicy`.
    Background,
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassMode::Manual => write!(f, "manual"),
            PassMode::Background => write!(f, "background"),
        }
    }
}

pub struct SyncOrchestrator {
    ctx: SyncContext,
    user_id: String,
    background_conflicts: BackgroundConflictPolicy,
    past_days: u64,
    future_months: u32,
    /// Calendar ids with a pass in flight.
    in_flight: Mutex<HashSet<String>>,
}

/// Releases a calendar's single-writer slot when dropped.
struct InFlight<'a> {
    slots: &'a Mutex<HashSet<String>>,
    calendar_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.calendar_id);
    }
}

/// State of one calendar's pass, fixed when the pass starts.
struct Pass<'a> {
    source: &'a CalendarSource,
    remote_ref: RemoteCalendarRef,
    now: DateTime<Utc>,
    outcome: SourceOutcome,
}

impl SyncOrchestrator {
    pub fn new(ctx: SyncContext, user_id: &str) -> Self {
        SyncOrchestrator {
            ctx,
            user_id: user_id.to_string(),
            background_conflicts: BackgroundConflictPolicy::default(),
            past_days: DEFAULT_PAST_DAYS,
            future_months: DEFAULT_FUTURE_MONTHS,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(ctx: SyncContext, config: &SyncConfig) -> Self {
        SyncOrchestrator {
            background_conflicts: config.background_conflicts,
            past_days: config.past_days,
            future_months: config.future_months,
            ..Self::new(ctx, &config.user_id)
        }
    }

    pub fn with_background_conflicts(mut self, policy: BackgroundConflictPolicy) -> Self {
        self.background_conflicts = policy;
        self
    }

    /// Reconcile every linked calendar.
    pub async fn run(&self, mode: PassMode) -> CalSyncResult<SyncReport> {
        let sources = self.ctx.sources.all_sources().await?;
        let report = self.run_sources(&sources, mode).await;
        self.publish_conflicts(&report, None);
        Ok(report)
    }

    /// Reconcile a single calendar. Conflicts of other calendars are kept.
    pub async fn run_calendar(&self, calendar_id: &str, mode: PassMode) -> CalSyncResult<SyncReport> {
        let source = self
            .ctx
            .sources
            .source_for_calendar(calendar_id)
            .await?
            .ok_or_else(|| CalSyncError::SourceNotFound(calendar_id.to_string()))?;

        let report = self.run_sources(std::slice::from_ref(&source), mode).await;
        self.publish_conflicts(&report, Some(calendar_id));
        Ok(report)
    }

    async fn run_sources(&self, sources: &[CalendarSource], mode: PassMode) -> SyncReport {
        let now = self.ctx.clock.now();
        let window = SyncWindow::with_span(now, self.past_days, self.future_months);

        info!(%mode, sources = sources.len(), from = %window.from, to = %window.to, "sync pass starting");

        // Sources share no mutable state, so they run side by side.
        let outcomes = join_all(
            sources
                .iter()
                .map(|source| self.sync_source(source, now, &window)),
        )
        .await;

        let report = SyncReport {
            mode,
            started_at: now,
            sources: outcomes,
        };

        info!(
            %mode,
            conflicts = report.count(ChangeKind::Conflict),
            failures = report.failures(),
            "sync pass finished"
        );

        report
    }

    fn publish_conflicts(&self, report: &SyncReport, only_calendar: Option<&str>) {
        let found = report.conflicts();

        match (report.mode, self.background_conflicts) {
            (PassMode::Manual, _) => {
                let settled: HashSet<&str> = report
                    .sources
                    .iter()
                    .filter(|s| s.status == SourceStatus::Synced)
                    .map(|s| s.calendar_id.as_str())
                    .collect();
                let in_pass: HashSet<&str> =
                    report.sources.iter().map(|s| s.calendar_id.as_str()).collect();

                // A source that was skipped says nothing about its conflicts,
                // and neither does one outside a single-calendar pass.
                let mut kept: Vec<SyncConflict> = self
                    .ctx
                    .conflicts
                    .snapshot()
                    .into_iter()
                    .filter(|c| {
                        let calendar_id = c.calendar_id.as_str();
                        !settled.contains(calendar_id)
                            && (only_calendar.is_some() || in_pass.contains(calendar_id))
                    })
                    .collect();
                kept.extend(found);
                self.ctx.conflicts.replace(kept);
            }
            (PassMode::Background, BackgroundConflictPolicy::Surface) => {
                self.ctx.conflicts.merge(found)
            }
            (PassMode::Background, BackgroundConflictPolicy::Defer) => {
                if !found.is_empty() {
                    debug!(count = found.len(), "deferring conflicts to next manual sync");
                }
            }
        }
    }

    fn claim(&self, calendar_id: &str) -> Option<InFlight<'_>> {
        let mut slots = self.in_flight.lock();
        if !slots.insert(calendar_id.to_string()) {
            return None;
        }
        Some(InFlight {
            slots: &self.in_flight,
            calendar_id: calendar_id.to_string(),
        })
    }

    async fn sync_source(
        &self,
        source: &CalendarSource,
        now: DateTime<Utc>,
        window: &SyncWindow,
    ) -> SourceOutcome {
        let calendar_id = source.calendar_id.as_str();

        if !source.sync_enabled {
            return SourceOutcome::new(calendar_id, SourceStatus::Disabled);
        }

        let Some(_slot) = self.claim(calendar_id) else {
            warn!(%calendar_id, "sync already in progress, skipping");
            return SourceOutcome::new(calendar_id, SourceStatus::Busy);
        };

        let gateway = &self.ctx.gateway;
        if !gateway
            .has_credentials(&source.provider, &source.provider_account_id)
            .await
        {
            warn!(%calendar_id, provider = %source.provider, "no usable credentials");
            return SourceOutcome::new(calendar_id, SourceStatus::NoCredentials);
        }

        let remote_ref = source.remote_ref();

        let Some(remote_events) = gateway.list_events(&remote_ref, window).await else {
            warn!(%calendar_id, remote = %remote_ref, "remote listing failed, leaving calendar untouched");
            return SourceOutcome::new(calendar_id, SourceStatus::RemoteUnavailable);
        };

        let locals = match self
            .ctx
            .store
            .events_for_calendars_in_range(&self.user_id, &[source.calendar_id.clone()], window)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(%calendar_id, error = %e, "local listing failed");
                return SourceOutcome::new(calendar_id, SourceStatus::StoreUnavailable(e.to_string()));
            }
        };

        let mut pass = Pass {
            source,
            remote_ref,
            now,
            outcome: SourceOutcome::new(calendar_id, SourceStatus::Synced),
        };

        debug!(%calendar_id, local = locals.len(), remote = remote_events.len(), "reconciling");

        let (pending, linked): (Vec<Event>, Vec<Event>) =
            locals.into_iter().partition(|e| !e.is_linked());

        let mut remote_ids: HashSet<String> = remote_events.iter().map(|e| e.id.clone()).collect();

        // Pending creates first. Events pushed here are not paired again in
        // this pass; their new ids only protect them from orphan cleanup.
        for event in pending {
            if let Some(created_id) = self.push_new(&mut pass, event).await {
                remote_ids.insert(created_id);
            }
        }

        let mut locals_by_external_id: HashMap<String, Event> = HashMap::new();
        for event in linked {
            let Some(external_id) = event.external_id.clone() else {
                continue;
            };
            if locals_by_external_id.contains_key(&external_id) {
                warn!(%calendar_id, %external_id, event_id = %event.id, "second local event for one remote id, skipping");
                continue;
            }
            locals_by_external_id.insert(external_id, event);
        }

        for remote in &remote_events {
            let local = match locals_by_external_id.remove(&remote.id) {
                Some(local) => Some(local),
                None if !remote.cancelled => self.find_outside_window(&mut pass, &remote.id).await,
                None => None,
            };

            let Some(kind) = classify(local.as_ref(), Some(remote)) else {
                continue;
            };

            self.apply(&mut pass, kind, local, remote).await;
        }

        // Orphan cleanup needs the final remote id set, so it runs last.
        for (_, local) in locals_by_external_id {
            if is_orphan(&local, &remote_ids) {
                debug!(%calendar_id, event_id = %local.id, "remote no longer lists event");
                self.delete_local(&mut pass, &local).await;
            }
        }

        self.record_sync_time(calendar_id, now).await;

        pass.outcome
    }

    /// Re-reads the source so a concurrent enable/disable is not overwritten.
    async fn record_sync_time(&self, calendar_id: &str, now: DateTime<Utc>) {
        let result = match self.ctx.sources.source_for_calendar(calendar_id).await {
            Ok(Some(mut source)) => {
                source.last_synced_at = Some(now);
                self.ctx.sources.upsert(&source).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(%calendar_id, error = %e, "could not record sync time");
        }
    }

    /// A remote event moved into the window while its local copy sits outside it.
    async fn find_outside_window(&self, pass: &mut Pass<'_>, external_id: &str) -> Option<Event> {
        match self
            .ctx
            .store
            .event_by_external_id(&pass.source.calendar_id, external_id)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(calendar_id = %pass.source.calendar_id, %external_id, error = %e, "lookup by remote id failed");
                pass.outcome.failures += 1;
                None
            }
        }
    }

    async fn apply(
        &self,
        pass: &mut Pass<'_>,
        kind: ChangeKind,
        local: Option<Event>,
        remote: &ExternalEvent,
    ) {
        let calendar_id = pass.source.calendar_id.as_str();
        let now = pass.now;

        let result = match (kind, local) {
            (ChangeKind::CreateLocal, _) => {
                let event = Event::from_remote(&self.user_id, calendar_id, remote, now);
                self.ctx.store.add_event(&event).await.map(|_| true)
            }
            (ChangeKind::DeleteLocal, Some(local)) => {
                self.ctx.store.delete_event(&local.id).await.map(|_| true)
            }
            (ChangeKind::PullMerge, Some(mut local)) => {
                local.pull_from(remote, now);
                self.ctx.store.update_event(&local).await.map(|_| true)
            }
            (ChangeKind::PushMerge, Some(mut local)) => {
                let payload = ExternalEvent::from_local(&local, now);
                match self.ctx.gateway.update_event(&pass.remote_ref, &payload).await {
                    Some(response) => {
                        local.mark_pushed(&response, now);
                        self.ctx.store.update_event(&local).await.map(|_| true)
                    }
                    None => Ok(false),
                }
            }
            (ChangeKind::Touch, Some(mut local)) => {
                if local.sync_state == SyncState::SyncedAt(now) {
                    Ok(true)
                } else {
                    local.sync_state = SyncState::SyncedAt(now);
                    self.ctx.store.update_event(&local).await.map(|_| true)
                }
            }
            (ChangeKind::Conflict, Some(local)) => {
                debug!(%calendar_id, event_id = %local.id, external_id = %remote.id, "both sides changed");
                pass.outcome
                    .conflicts
                    .push(SyncConflict::new(calendar_id, local, remote.clone()));
                Ok(true)
            }
            (kind, _) => {
                warn!(%calendar_id, external_id = %remote.id, %kind, "unexpected pairing outcome");
                Ok(false)
            }
        };

        self.settle(pass, kind, &remote.id, result);
    }

    async fn push_new(&self, pass: &mut Pass<'_>, mut event: Event) -> Option<String> {
        let now = pass.now;
        let payload = ExternalEvent::from_local(&event, now);

        let created = self
            .ctx
            .gateway
            .create_event(&pass.remote_ref, &payload)
            .await;

        let result = match &created {
            Some(response) => {
                event.mark_pushed(response, now);
                self.ctx.store.update_event(&event).await.map(|_| true)
            }
            // Left pending, untouched, for the next pass.
            None => Ok(false),
        };

        let event_id = event.id.clone();
        self.settle(pass, ChangeKind::CreateRemote, &event_id, result);
        created.map(|c| c.id)
    }

    async fn delete_local(&self, pass: &mut Pass<'_>, local: &Event) {
        let result = self.ctx.store.delete_event(&local.id).await.map(|_| true);
        self.settle(pass, ChangeKind::DeleteLocal, &local.id, result);
    }

    /// Count one event's outcome. Failures stay local to the event.
    fn settle(&self, pass: &mut Pass<'_>, kind: ChangeKind, id: &str, result: CalSyncResult<bool>) {
        let calendar_id = pass.source.calendar_id.as_str();
        match result {
            Ok(true) => {
                debug!(%calendar_id, %id, %kind, "applied");
                pass.outcome.record(kind);
            }
            Ok(false) => {
                info!(%calendar_id, %id, %kind, "remote call failed, will retry next sync");
                pass.outcome.failures += 1;
            }
            Err(e) => {
                warn!(%calendar_id, %id, %kind, error = %e, "store write failed");
                pass.outcome.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use crate::store::{CalendarSourceMap, EventStore};
    use crate::testing::{ACCOUNT, Harness, PROVIDER, remote_ref};

    async fn edit_locally(h: &Harness, id: &str, title: &str) {
        let mut event = h.stored(id).unwrap();
        event.content.title = title.to_string();
        event.sync_state = SyncState::Dirty;
        h.store.update_event(&event).await.unwrap();
    }

    /// A linked calendar holding one remote event already pulled locally.
    async fn synced_pair(h: &Harness) -> (Event, ExternalEvent) {
        h.link("work").await;
        let remote = h.gateway.insert(&remote_ref("work"), "Standup", h.at(24));
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        let local = h.stored_by_external_id(&remote.id).unwrap();
        (local, remote)
    }

    #[tokio::test]
    async fn test_remote_event_is_adopted() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;

        assert_eq!(local.content.title, "Standup");
        assert_eq!(local.source, EventSource::Remote);
        assert_eq!(local.external_updated_at, Some(remote.updated_at));
        assert_eq!(local.sync_state, SyncState::SyncedAt(h.at(0)));
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_changes_nothing() {
        let h = Harness::new();
        synced_pair(&h).await;

        let mut revisions = h.store.watch();
        let _ = revisions.borrow_and_update();
        let writes_before = h.gateway.write_calls();

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.count(ChangeKind::Touch), 1);
        assert!(!report.sources[0].has_changes());
        assert!(!revisions.has_changed().unwrap());
        assert_eq!(h.gateway.write_calls(), writes_before);
    }

    #[tokio::test]
    async fn test_event_created_offline_is_pushed_on_next_pass() {
        let h = Harness::new();
        h.link("work").await;
        h.gateway.set_offline(true);

        let created = h.writer().create(h.local("work", "Dentist", 48)).await.unwrap();
        assert!(!created.is_linked());
        assert!(created.sync_state.is_dirty());

        h.gateway.set_offline(false);
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::CreateRemote), 1);

        let stored = h.stored(&created.id).unwrap();
        let external_id = stored.external_id.clone().unwrap();
        let remote = h.gateway.event(&remote_ref("work"), &external_id).unwrap();
        assert_eq!(remote.summary, "Dentist");
        assert_eq!(stored.sync_state, SyncState::SyncedAt(h.at(0)));
        assert_eq!(h.store.len(), 1);

        // The freshly pushed event must not be adopted a second time
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::CreateLocal), 0);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_leaves_event_pending() {
        let h = Harness::new();
        h.link("work").await;
        let pending = h.local("work", "Draft", 5);
        h.store.add_event(&pending).await.unwrap();
        h.gateway.fail_writes(true);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.failures(), 1);
        assert_eq!(h.stored(&pending.id).unwrap(), pending);
    }

    #[tokio::test]
    async fn test_pull_and_push_merges() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;

        h.gateway.edit(&remote_ref("work"), &remote.id, |e| e.summary = "Standup (moved)".into());
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::PullMerge), 1);
        assert_eq!(h.stored(&local.id).unwrap().content.title, "Standup (moved)");

        edit_locally(&h, &local.id, "Standup (local)").await;
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::PushMerge), 1);
        let pushed = h.gateway.event(&remote_ref("work"), &remote.id).unwrap();
        assert_eq!(pushed.summary, "Standup (local)");
        let stored = h.stored(&local.id).unwrap();
        assert_eq!(stored.external_updated_at, Some(pushed.updated_at));
        assert!(!stored.sync_state.is_dirty());
    }

    #[tokio::test]
    async fn test_failed_push_merge_stays_dirty() {
        let h = Harness::new();
        let (local, _) = synced_pair(&h).await;
        edit_locally(&h, &local.id, "Offline edit").await;
        h.gateway.fail_writes(true);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.failures(), 1);
        assert_eq!(h.stored(&local.id).unwrap().sync_state, SyncState::Dirty);
    }

    #[tokio::test]
    async fn test_both_sides_changed_is_surfaced_not_applied() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;

        edit_locally(&h, &local.id, "Local title").await;
        h.gateway.edit(&remote_ref("work"), &remote.id, |e| e.summary = "Remote title".into());
        let remote_before = h.gateway.event(&remote_ref("work"), &remote.id).unwrap();

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.count(ChangeKind::Conflict), 1);
        assert_eq!(h.conflicts.len(), 1);
        assert_eq!(h.stored(&local.id).unwrap().content.title, "Local title");
        assert_eq!(h.gateway.event(&remote_ref("work"), &remote.id).unwrap(), remote_before);

        // Found again on the next pass without piling up
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(h.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_remote_deletes_even_dirty_local() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;
        edit_locally(&h, &local.id, "Edited meanwhile").await;
        h.gateway.cancel(&remote_ref("work"), &remote.id);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.count(ChangeKind::DeleteLocal), 1);
        assert_eq!(report.count(ChangeKind::Conflict), 0);
        assert!(h.stored(&local.id).is_none());
        assert!(h.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_remote_without_local_is_ignored() {
        let h = Harness::new();
        h.link("work").await;
        let remote = h.gateway.insert(&remote_ref("work"), "Gone", h.at(3));
        h.gateway.cancel(&remote_ref("work"), &remote.id);

        h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_event_missing_from_listing_is_removed() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;
        let pending = h.local("work", "Not pushed", 6);
        h.store.add_event(&pending).await.unwrap();

        h.gateway.remove(&remote_ref("work"), &remote.id);
        h.gateway.fail_writes(true);
        h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert!(h.stored(&local.id).is_none());
        assert!(h.stored(&pending.id).is_some());
    }

    #[tokio::test]
    async fn test_failed_listing_touches_nothing() {
        let h = Harness::new();
        let (local, _) = synced_pair(&h).await;
        h.gateway.set_offline(true);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.sources[0].status, SourceStatus::RemoteUnavailable);
        assert_eq!(h.stored(&local.id).unwrap(), local);
    }

    #[tokio::test]
    async fn test_one_failing_calendar_does_not_stop_others() {
        let h = Harness::new();
        h.link("work").await;
        h.link("home").await;
        h.gateway.insert(&remote_ref("work"), "Work thing", h.at(2));
        h.gateway.insert(&remote_ref("home"), "Home thing", h.at(2));
        h.gateway.fail_calendar(&remote_ref("work"));

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        let status = |id: &str| {
            report
                .sources
                .iter()
                .find(|s| s.calendar_id == id)
                .map(|s| s.status.clone())
        };
        assert_eq!(status("work"), Some(SourceStatus::RemoteUnavailable));
        assert_eq!(status("home"), Some(SourceStatus::Synced));
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.all()[0].calendar_id, "home");
    }

    #[tokio::test]
    async fn test_disabled_and_unauthorized_sources_are_skipped() {
        let h = Harness::new();
        let mut source = h.link("work").await;
        source.sync_enabled = false;
        h.sources.upsert(&source).await.unwrap();
        h.gateway.insert(&remote_ref("work"), "Hidden", h.at(2));

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.sources[0].status, SourceStatus::Disabled);
        assert!(h.store.is_empty());

        source.sync_enabled = true;
        h.sources.upsert(&source).await.unwrap();
        h.gateway.revoke(PROVIDER, ACCOUNT);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.sources[0].status, SourceStatus::NoCredentials);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_remote_moved_into_window_pairs_with_existing_local() {
        let h = Harness::new();
        let (local, remote) = synced_pair(&h).await;

        // Local copy drifted outside the window without being dirtied
        let mut far = h.stored(&local.id).unwrap();
        far.content.start = h.at(-24 * 200);
        far.content.end = h.at(-24 * 200 + 1);
        h.store.update_event(&far).await.unwrap();

        h.gateway.edit(&remote_ref("work"), &remote.id, |e| e.summary = "Rescheduled".into());
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.count(ChangeKind::CreateLocal), 0);
        assert_eq!(report.count(ChangeKind::PullMerge), 1);
        assert_eq!(h.store.len(), 1);
        let stored = h.stored(&local.id).unwrap();
        assert_eq!(stored.content.title, "Rescheduled");
        assert_eq!(stored.content.start, h.at(24));
    }

    #[tokio::test]
    async fn test_overlapping_pass_for_same_calendar_is_busy() {
        let h = Harness::new();
        h.link("work").await;
        let gate = h.gateway.hold_listings();
        let orchestrator = h.orchestrator();

        let first = orchestrator.run(PassMode::Manual);
        let second = async {
            let report = orchestrator.run(PassMode::Background).await;
            gate.add_permits(1);
            report
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().sources[0].status, SourceStatus::Synced);
        assert_eq!(second.unwrap().sources[0].status, SourceStatus::Busy);

        // The slot is free again once the first pass finished
        let report = orchestrator.run(PassMode::Manual).await.unwrap();
        assert_eq!(report.sources[0].status, SourceStatus::Synced);
    }

    async fn conflicted(h: &Harness) -> Event {
        let (local, remote) = synced_pair(h).await;
        edit_locally(h, &local.id, "Local").await;
        h.gateway.edit(&remote_ref("work"), &remote.id, |e| e.summary = "Remote".into());
        local
    }

    #[tokio::test]
    async fn test_background_pass_defers_conflicts() {
        let h = Harness::new();
        conflicted(&h).await;

        let report = h.orchestrator().run(PassMode::Background).await.unwrap();
        assert_eq!(report.count(ChangeKind::Conflict), 1);
        assert!(h.conflicts.is_empty());

        h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(h.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_background_pass_can_surface_conflicts() {
        let h = Harness::new();
        conflicted(&h).await;

        h.orchestrator()
            .with_background_conflicts(BackgroundConflictPolicy::Surface)
            .run(PassMode::Background)
            .await
            .unwrap();

        assert_eq!(h.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_calendar_pass_keeps_other_conflicts() {
        let h = Harness::new();
        conflicted(&h).await;
        h.link("home").await;
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(h.conflicts.len(), 1);

        let report = h
            .orchestrator()
            .run_calendar("home", PassMode::Manual)
            .await
            .unwrap();

        assert_eq!(report.sources.len(), 1);
        assert_eq!(h.conflicts.len(), 1);
        assert_eq!(h.conflicts.snapshot()[0].calendar_id, "work");
    }

    #[tokio::test]
    async fn test_skipped_source_keeps_its_conflicts() {
        let h = Harness::new();
        conflicted(&h).await;
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(h.conflicts.len(), 1);

        let gate = h.gateway.hold_listings();
        let orchestrator = h.orchestrator();
        let background = orchestrator.run(PassMode::Background);
        let manual = async {
            let report = orchestrator.run(PassMode::Manual).await;
            gate.add_permits(1);
            report
        };
        let (_, manual) = tokio::join!(background, manual);

        assert_eq!(manual.unwrap().sources[0].status, SourceStatus::Busy);
        assert_eq!(h.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_source_keeps_its_conflicts() {
        let h = Harness::new();
        conflicted(&h).await;
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        h.gateway.set_offline(true);

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.sources[0].status, SourceStatus::RemoteUnavailable);
        assert_eq!(h.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_full_pass_drops_conflicts_of_unlinked_calendars() {
        let h = Harness::new();
        conflicted(&h).await;
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        h.sources.delete_by_calendar("work").await.unwrap();

        h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert!(h.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_calendar_is_an_error() {
        let h = Harness::new();
        let result = h.orchestrator().run_calendar("nope", PassMode::Manual).await;
        assert!(matches!(result, Err(CalSyncError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_pass_records_sync_time() {
        let h = Harness::new();
        h.link("work").await;
        h.orchestrator().run(PassMode::Manual).await.unwrap();

        let source = h.sources.source_for_calendar("work").await.unwrap().unwrap();
        assert_eq!(source.last_synced_at, Some(h.at(0)));
    }
}
