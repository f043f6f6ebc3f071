//! Linking provider accounts to local calendars.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::calendar_source::CalendarSource;
use crate::context::SyncContext;
use crate::error::{CalSyncError, CalSyncResult};

pub struct Accounts {
    ctx: SyncContext,
}

impl Accounts {
    pub fn new(ctx: SyncContext) -> Self {
        Accounts { ctx }
    }

    /// Create a calendar source for every remote calendar of the account
    /// that is not linked yet. Returns the new sources.
    pub async fn link(&self, provider: &str, account_id: &str) -> CalSyncResult<Vec<CalendarSource>> {
        let calendars = self
            .ctx
            .gateway
            .list_calendars(provider, account_id)
            .await
            .ok_or_else(|| {
                CalSyncError::RemoteUnavailable(format!("{provider}:{account_id}"))
            })?;

        let existing = self.ctx.sources.all_sources().await?;
        let mut taken: HashSet<String> = existing.iter().map(|s| s.calendar_id.clone()).collect();

        let mut linked = Vec::new();
        for calendar in calendars {
            let already = existing.iter().any(|s| {
                s.provider == provider
                    && s.provider_account_id == account_id
                    && s.provider_calendar_id == calendar.id
            });
            if already {
                continue;
            }

            let calendar_id = unique_calendar_id(&calendar.name, &taken)?;
            taken.insert(calendar_id.clone());

            let source = CalendarSource::new(&calendar_id, provider, account_id, &calendar.id);
            self.ctx.sources.upsert(&source).await?;
            info!(%calendar_id, %provider, %account_id, remote_calendar = %calendar.id, "calendar linked");
            linked.push(source);
        }

        Ok(linked)
    }

    /// Drop every source of the account. Their events stay as plain local
    /// events.
    pub async fn unlink(&self, provider: &str, account_id: &str) -> CalSyncResult<usize> {
        let calendar_ids: Vec<String> = self
            .ctx
            .sources
            .all_sources()
            .await?
            .into_iter()
            .filter(|s| s.provider == provider && s.provider_account_id == account_id)
            .map(|s| s.calendar_id)
            .collect();

        let removed = self
            .ctx
            .sources
            .delete_by_account(provider, account_id)
            .await?;

        for calendar_id in &calendar_ids {
            self.release_calendar(calendar_id).await?;
        }

        info!(%provider, %account_id, removed, "account unlinked");
        Ok(removed)
    }

    pub async fn unlink_calendar(&self, calendar_id: &str) -> CalSyncResult<()> {
        if !self.ctx.sources.delete_by_calendar(calendar_id).await? {
            return Err(CalSyncError::SourceNotFound(calendar_id.to_string()));
        }
        self.release_calendar(calendar_id).await
    }

    /// Cut the calendar's events loose from the provider. Left linked, a later
    /// source with the same calendar id would see them as orphans and delete
    /// them.
    async fn release_calendar(&self, calendar_id: &str) -> CalSyncResult<()> {
        let mut detached = 0;
        for mut event in self.ctx.store.events_in_calendar(calendar_id).await? {
            if !event.is_linked() {
                continue;
            }
            event.detach();
            self.ctx.store.update_event(&event).await?;
            detached += 1;
        }

        let dropped = self.ctx.conflicts.remove_calendar(calendar_id);
        debug!(%calendar_id, detached, dropped_conflicts = dropped, "calendar released");
        Ok(())
    }

    pub async fn set_sync_enabled(&self, calendar_id: &str, enabled: bool) -> CalSyncResult<()> {
        let mut source = self
            .ctx
            .sources
            .source_for_calendar(calendar_id)
            .await?
            .ok_or_else(|| CalSyncError::SourceNotFound(calendar_id.to_string()))?;

        source.sync_enabled = enabled;
        self.ctx.sources.upsert(&source).await
    }
}

/// Slug of the calendar name, suffixed `-2`, `-3`, ... on collision.
fn unique_calendar_id(name: &str, taken: &HashSet<String>) -> CalSyncResult<String> {
    let base = match slug::slugify(name) {
        s if s.is_empty() => "calendar".to_string(),
        s => s,
    };

    if !taken.contains(&base) {
        return Ok(base);
    }

    for n in 2..=100 {
        let suffixed = format!("{}-{}", base, n);
        if !taken.contains(&suffixed) {
            return Ok(suffixed);
        }
    }

    Err(CalSyncError::Config(format!(
        "Too many calendar name collisions for '{}'",
        base
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use crate::store::CalendarSourceMap;
    use crate::sync::classifier::ChangeKind;
    use crate::sync::conflict::SyncConflict;
    use crate::sync::orchestrator::PassMode;
    use crate::testing::{ACCOUNT, Harness, PROVIDER, remote_ref};

    #[test]
    fn test_unique_calendar_id() {
        let mut taken = HashSet::new();
        assert_eq!(unique_calendar_id("Work Stuff", &taken).unwrap(), "work-stuff");

        taken.insert("work-stuff".to_string());
        taken.insert("work-stuff-2".to_string());
        assert_eq!(unique_calendar_id("Work Stuff", &taken).unwrap(), "work-stuff-3");

        assert_eq!(unique_calendar_id("!!!", &HashSet::new()).unwrap(), "calendar");
    }

    #[tokio::test]
    async fn test_link_creates_one_source_per_calendar() {
        let h = Harness::new();
        h.gateway.add_calendar(PROVIDER, ACCOUNT, "cal-1", "Work");
        h.gateway.add_calendar(PROVIDER, ACCOUNT, "cal-2", "Work");
        let accounts = Accounts::new(h.ctx());

        let linked = accounts.link(PROVIDER, ACCOUNT).await.unwrap();
        let ids: Vec<&str> = linked.iter().map(|s| s.calendar_id.as_str()).collect();
        assert_eq!(ids, vec!["work", "work-2"]);

        // Relinking only picks up calendars not seen before
        h.gateway.add_calendar(PROVIDER, ACCOUNT, "cal-3", "Family");
        let linked = accounts.link(PROVIDER, ACCOUNT).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].provider_calendar_id, "cal-3");
        assert_eq!(h.sources.all_sources().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_link_while_offline_fails() {
        let h = Harness::new();
        h.gateway.set_offline(true);

        let result = Accounts::new(h.ctx()).link(PROVIDER, ACCOUNT).await;

        assert!(matches!(result, Err(CalSyncError::RemoteUnavailable(_))));
        assert!(h.sources.all_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlink_and_toggle() {
        let h = Harness::new();
        h.link("work").await;
        h.link("home").await;
        let accounts = Accounts::new(h.ctx());

        accounts.set_sync_enabled("work", false).await.unwrap();
        let work = h.sources.source_for_calendar("work").await.unwrap().unwrap();
        assert!(!work.sync_enabled);

        accounts.unlink_calendar("home").await.unwrap();
        assert!(matches!(
            accounts.unlink_calendar("home").await,
            Err(CalSyncError::SourceNotFound(_))
        ));

        assert_eq!(accounts.unlink(PROVIDER, ACCOUNT).await.unwrap(), 1);
        assert!(matches!(
            accounts.set_sync_enabled("work", true).await,
            Err(CalSyncError::SourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unlinked_events_survive_relink_under_same_name() {
        let h = Harness::new();
        h.gateway.add_calendar(PROVIDER, ACCOUNT, "cal-a", "Work");
        let accounts = Accounts::new(h.ctx());
        let first = accounts.link(PROVIDER, ACCOUNT).await.unwrap();
        let remote = h.gateway.insert(&first[0].remote_ref(), "Review", h.at(4));
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        let pulled = h.stored_by_external_id(&remote.id).unwrap();

        accounts.unlink(PROVIDER, ACCOUNT).await.unwrap();

        let released = h.stored(&pulled.id).unwrap();
        assert_eq!(released.external_id, None);
        assert_eq!(released.source, EventSource::Local);
        assert!(released.sync_state.is_dirty());

        // Another account whose calendar slugifies to the same local id
        h.gateway.add_calendar(PROVIDER, "other@example.com", "cal-b", "Work");
        let second = accounts.link(PROVIDER, "other@example.com").await.unwrap();
        assert_eq!(second[0].calendar_id, "work");

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();

        assert_eq!(report.count(ChangeKind::DeleteLocal), 0);
        assert_eq!(report.count(ChangeKind::CreateRemote), 1);
        let kept = h.stored(&pulled.id).unwrap();
        assert_eq!(kept.content.title, "Review");
        assert_eq!(h.gateway.events(&second[0].remote_ref()).len(), 1);
    }

    #[tokio::test]
    async fn test_unlink_calendar_detaches_events_and_drops_conflicts() {
        let h = Harness::new();
        h.link("work").await;
        h.link("home").await;
        let remote = h.gateway.insert(&remote_ref("work"), "Standup", h.at(2));
        h.orchestrator().run(PassMode::Manual).await.unwrap();
        let local = h.stored_by_external_id(&remote.id).unwrap();
        h.conflicts
            .merge(vec![SyncConflict::new("work", local.clone(), remote)]);

        Accounts::new(h.ctx()).unlink_calendar("work").await.unwrap();

        assert!(!h.stored(&local.id).unwrap().is_linked());
        assert!(h.conflicts.is_empty());
        assert!(h.sources.source_for_calendar("home").await.unwrap().is_some());
    }
}
