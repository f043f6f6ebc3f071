//! Decides which side of a local/remote pair changed.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::{Event, ExternalEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Remote event with no local counterpart: adopt it.
    CreateLocal,
    /// Local event never pushed: create it remotely.
    CreateRemote,
    /// Only the remote changed: overwrite local content.
    PullMerge,
    /// Only the local side changed: push local content.
    PushMerge,
    /// Nothing changed: refresh bookkeeping.
    Touch,
    /// Both sides changed since the last confirmed sync.
    Conflict,
    /// Remote cancelled or no longer lists the event.
    DeleteLocal,
}

impl ChangeKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeKind::CreateLocal | ChangeKind::CreateRemote => "+",
            ChangeKind::PullMerge | ChangeKind::PushMerge => "~",
            ChangeKind::Touch => "=",
            ChangeKind::Conflict => "!",
            ChangeKind::DeleteLocal => "-",
        }
    }

    /// Whether applying this kind talks to the remote.
    pub fn pushes(&self) -> bool {
        matches!(self, ChangeKind::CreateRemote | ChangeKind::PushMerge)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::CreateLocal => "create local",
            ChangeKind::CreateRemote => "create remote",
            ChangeKind::PullMerge => "pull",
            ChangeKind::PushMerge => "push",
            ChangeKind::Touch => "touch",
            ChangeKind::Conflict => "conflict",
            ChangeKind::DeleteLocal => "delete local",
        };
        write!(f, "{}", label)
    }
}

/// Local edits not yet confirmed by the remote.
pub fn local_changed(local: &Event) -> bool {
    local.sync_state.is_dirty()
}

/// Remote edits newer than the stamp recorded at the last sync.
/// An event with no recorded stamp counts any remote stamp as newer.
pub fn remote_changed(local: &Event, remote: &ExternalEvent) -> bool {
    match local.external_updated_at {
        Some(seen) => remote.updated_at > seen,
        None => true,
    }
}

/// Classify one pairing. Rules are applied in priority order:
///
/// 1. remote cancelled wins over everything, dirty or not
/// 2. remote without local pair is adopted
/// 3. local without external id is pushed as new
/// 4. paired events compare local dirtiness with remote recency
///
/// A linked local event with no remote pair is an orphan.
pub fn classify(local: Option<&Event>, remote: Option<&ExternalEvent>) -> Option<ChangeKind> {
    match (local, remote) {
        (None, None) => None,
        (None, Some(remote)) if remote.cancelled => None,
        (Some(_), Some(remote)) if remote.cancelled => Some(ChangeKind::DeleteLocal),
        (None, Some(_)) => Some(ChangeKind::CreateLocal),
        (Some(local), _) if !local.is_linked() => Some(ChangeKind::CreateRemote),
        (Some(_), None) => Some(ChangeKind::DeleteLocal),
        (Some(local), Some(remote)) => {
            let kind = match (local_changed(local), remote_changed(local, remote)) {
                (true, true) => ChangeKind::Conflict,
                (false, true) => ChangeKind::PullMerge,
                (true, false) => ChangeKind::PushMerge,
                (false, false) => ChangeKind::Touch,
            };
            Some(kind)
        }
    }
}

/// Linked to a remote id that the latest listing no longer contains.
pub fn is_orphan(local: &Event, remote_ids: &HashSet<String>) -> bool {
    local
        .external_id
        .as_ref()
        .is_some_and(|id| !remote_ids.contains(id))
}
