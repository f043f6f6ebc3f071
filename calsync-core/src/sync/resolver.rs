//! Applies a user's choice to a surfaced conflict.

use tracing::{info, warn};

use crate::context::SyncContext;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, ExternalEvent};
use crate::sync::conflict::{SyncConflict, SyncResolutionAction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    KeptLocal,
    KeptRemote,
    Duplicated { duplicate_id: String },
    /// The push for `KeepLocal` failed; the conflict stays pending.
    Deferred,
}

pub struct ConflictResolver {
    ctx: SyncContext,
}

impl ConflictResolver {
    pub fn new(ctx: SyncContext) -> Self {
        ConflictResolver { ctx }
    }

    /// Resolve one conflict. On success exactly that conflict leaves the
    /// surface; no other pending entry is touched.
    pub async fn resolve(
        &self,
        conflict: &SyncConflict,
        action: SyncResolutionAction,
    ) -> CalSyncResult<Resolution> {
        let key = conflict.key();

        // The surfaced snapshot can be stale; act on what the store holds now.
        let Some(local) = self.ctx.store.get_event(&conflict.local.id).await? else {
            self.ctx.conflicts.remove(&key);
            return Err(CalSyncError::EventNotFound(conflict.local.id.clone()));
        };

        let resolution = match action {
            SyncResolutionAction::KeepLocal => self.keep_local(conflict, local).await?,
            SyncResolutionAction::KeepRemote => self.keep_remote(conflict, local).await?,
            SyncResolutionAction::Duplicate => self.duplicate(conflict, local).await?,
        };

        if resolution != Resolution::Deferred {
            self.ctx.conflicts.remove(&key);
        }

        info!(
            calendar_id = %conflict.calendar_id,
            external_id = %conflict.remote.id,
            %action,
            ?resolution,
            "conflict resolved"
        );

        Ok(resolution)
    }

    async fn keep_local(&self, conflict: &SyncConflict, mut local: Event) -> CalSyncResult<Resolution> {
        let source = self
            .ctx
            .sources
            .source_for_calendar(&conflict.calendar_id)
            .await?
            .ok_or_else(|| CalSyncError::SourceNotFound(conflict.calendar_id.clone()))?;

        let now = self.ctx.clock.now();
        let mut payload = ExternalEvent::from_local(&local, now);
        payload.id = conflict.remote.id.clone();

        match self
            .ctx
            .gateway
            .update_event(&source.remote_ref(), &payload)
            .await
        {
            Some(response) => {
                local.mark_pushed(&response, now);
                self.ctx.store.update_event(&local).await?;
                Ok(Resolution::KeptLocal)
            }
            None => {
                warn!(event_id = %local.id, external_id = %conflict.remote.id, "push failed, conflict kept");
                Ok(Resolution::Deferred)
            }
        }
    }

    async fn keep_remote(&self, conflict: &SyncConflict, mut local: Event) -> CalSyncResult<Resolution> {
        local.pull_from(&conflict.remote, self.ctx.clock.now());
        self.ctx.store.update_event(&local).await?;
        Ok(Resolution::KeptRemote)
    }

    /// The copy takes the remote's content and its link. The original keeps
    /// its content and is unlinked, so the next pass pushes it as a new
    /// remote event instead of flagging the same pair again.
    async fn duplicate(&self, conflict: &SyncConflict, mut local: Event) -> CalSyncResult<Resolution> {
        let now = self.ctx.clock.now();

        let mut copy = Event::from_remote(&local.user_id, &conflict.calendar_id, &conflict.remote, now);
        copy.assignees = local.assignees.clone();
        self.ctx.store.add_event(&copy).await?;

        local.detach();
        self.ctx.store.update_event(&local).await?;

        Ok(Resolution::Duplicated {
            duplicate_id: copy.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, SyncState};
    use crate::store::EventStore;
    use crate::sync::classifier::ChangeKind;
    use crate::sync::orchestrator::PassMode;
    use crate::testing::{Harness, remote_ref};

    /// One surfaced conflict on calendar `calendar_id`: local says "Local",
    /// remote says "Remote".
    async fn surfaced(h: &Harness, calendar_id: &str) -> SyncConflict {
        h.link(calendar_id).await;
        let remote = h.gateway.insert(&remote_ref(calendar_id), "Original", h.at(4));
        h.orchestrator().run(PassMode::Manual).await.unwrap();

        let mut local = h.stored_by_external_id(&remote.id).unwrap();
        local.content.title = "Local".to_string();
        local.sync_state = SyncState::Dirty;
        h.store.update_event(&local).await.unwrap();
        h.gateway.edit(&remote_ref(calendar_id), &remote.id, |e| e.summary = "Remote".into());

        h.orchestrator().run(PassMode::Manual).await.unwrap();
        h.conflicts
            .snapshot()
            .into_iter()
            .find(|c| c.calendar_id == calendar_id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_keep_local_converges() {
        let h = Harness::new();
        let conflict = surfaced(&h, "work").await;

        let resolution = h
            .resolver()
            .resolve(&conflict, SyncResolutionAction::KeepLocal)
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::KeptLocal);
        assert!(h.conflicts.is_empty());
        let remote = h.gateway.event(&remote_ref("work"), &conflict.remote.id).unwrap();
        assert_eq!(remote.summary, "Local");

        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::Conflict), 0);
        assert_eq!(report.count(ChangeKind::Touch), 1);
    }

    #[tokio::test]
    async fn test_keep_remote_overwrites_local() {
        let h = Harness::new();
        let conflict = surfaced(&h, "work").await;

        h.resolver()
            .resolve(&conflict, SyncResolutionAction::KeepRemote)
            .await
            .unwrap();

        let local = h.stored(&conflict.local.id).unwrap();
        assert_eq!(local.content.title, "Remote");
        assert!(!local.sync_state.is_dirty());
        assert!(h.conflicts.is_empty());

        let writes = h.gateway.write_calls();
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::Conflict), 0);
        assert_eq!(h.gateway.write_calls(), writes);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_both_versions() {
        let h = Harness::new();
        let conflict = surfaced(&h, "work").await;

        let resolution = h
            .resolver()
            .resolve(&conflict, SyncResolutionAction::Duplicate)
            .await
            .unwrap();

        let Resolution::Duplicated { duplicate_id } = resolution else {
            panic!("expected a duplicate, got {:?}", resolution);
        };
        let copy = h.stored(&duplicate_id).unwrap();
        assert_eq!(copy.content.title, "Remote");
        assert_eq!(copy.external_id.as_deref(), Some(conflict.remote.id.as_str()));

        let original = h.stored(&conflict.local.id).unwrap();
        assert_eq!(original.content.title, "Local");
        assert!(!original.is_linked());
        assert_eq!(original.source, EventSource::Local);
        assert!(h.conflicts.is_empty());

        // The original goes out as a new remote event, not as the same conflict
        let report = h.orchestrator().run(PassMode::Manual).await.unwrap();
        assert_eq!(report.count(ChangeKind::Conflict), 0);
        assert_eq!(report.count(ChangeKind::CreateRemote), 1);
        assert_eq!(h.gateway.events(&remote_ref("work")).len(), 2);
        assert_eq!(h.store.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_keep_local_keeps_conflict() {
        let h = Harness::new();
        let conflict = surfaced(&h, "work").await;
        h.gateway.set_offline(true);

        let resolution = h
            .resolver()
            .resolve(&conflict, SyncResolutionAction::KeepLocal)
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Deferred);
        assert_eq!(h.conflicts.len(), 1);
        assert_eq!(h.stored(&conflict.local.id).unwrap().sync_state, SyncState::Dirty);
    }

    #[tokio::test]
    async fn test_resolving_one_leaves_the_rest() {
        let h = Harness::new();
        let work = surfaced(&h, "work").await;
        surfaced(&h, "home").await;
        assert_eq!(h.conflicts.len(), 2);

        h.resolver()
            .resolve(&work, SyncResolutionAction::KeepRemote)
            .await
            .unwrap();

        let left = h.conflicts.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].calendar_id, "home");
    }

    #[tokio::test]
    async fn test_missing_local_drops_conflict() {
        let h = Harness::new();
        let conflict = surfaced(&h, "work").await;
        h.store.delete_event(&conflict.local.id).await.unwrap();

        let result = h
            .resolver()
            .resolve(&conflict, SyncResolutionAction::KeepRemote)
            .await;

        assert!(matches!(result, Err(CalSyncError::EventNotFound(_))));
        assert!(h.conflicts.is_empty());
    }
}
