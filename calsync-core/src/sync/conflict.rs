//! Unresolved conflicts and the observable list that holds them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::event::{Event, ExternalEvent};

/// A pair where both sides changed since the last confirmed sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub calendar_id: String,
    pub local: Event,
    pub remote: ExternalEvent,
}

/// Identity of a conflict: at most one is open per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    pub calendar_id: String,
    pub external_id: String,
}

impl SyncConflict {
    pub fn new(calendar_id: &str, local: Event, remote: ExternalEvent) -> Self {
        SyncConflict {
            calendar_id: calendar_id.to_string(),
            local,
            remote,
        }
    }

    pub fn key(&self) -> ConflictKey {
        ConflictKey {
            calendar_id: self.calendar_id.clone(),
            external_id: self.remote.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResolutionAction {
    KeepLocal,
    KeepRemote,
    Duplicate,
}

impl fmt::Display for SyncResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResolutionAction::KeepLocal => write!(f, "keep local"),
            SyncResolutionAction::KeepRemote => write!(f, "keep remote"),
            SyncResolutionAction::Duplicate => write!(f, "duplicate"),
        }
    }
}

impl FromStr for SyncResolutionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "keep-local" | "keep_local" => Ok(SyncResolutionAction::KeepLocal),
            "remote" | "keep-remote" | "keep_remote" => Ok(SyncResolutionAction::KeepRemote),
            "duplicate" | "both" => Ok(SyncResolutionAction::Duplicate),
            other => Err(format!(
                "Unknown resolution '{}'. Expected local, remote or duplicate",
                other
            )),
        }
    }
}

/// Observable list of pending conflicts.
///
/// Every write keeps at most one entry per `ConflictKey`; later entries win.
pub struct ConflictSurface {
    tx: watch::Sender<Vec<SyncConflict>>,
}

impl Default for ConflictSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictSurface {
    pub fn new() -> Self {
        Self::with_conflicts(Vec::new())
    }

    pub fn with_conflicts(conflicts: Vec<SyncConflict>) -> Self {
        let (tx, _) = watch::channel(dedupe(conflicts));
        ConflictSurface { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SyncConflict>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<SyncConflict> {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Supersede everything with one pass's findings.
    pub fn replace(&self, conflicts: Vec<SyncConflict>) {
        self.tx.send_replace(dedupe(conflicts));
    }

    /// Add or refresh entries, leaving unrelated ones alone.
    pub fn merge(&self, conflicts: Vec<SyncConflict>) {
        if conflicts.is_empty() {
            return;
        }
        self.tx.send_modify(|current| {
            for conflict in conflicts {
                let key = conflict.key();
                match current.iter_mut().find(|c| c.key() == key) {
                    Some(existing) => *existing = conflict,
                    None => current.push(conflict),
                }
            }
        });
    }

    /// Remove exactly the entry for `key`. Returns whether it was present.
    pub fn remove(&self, key: &ConflictKey) -> bool {
        self.tx.send_if_modified(|current| {
            let before = current.len();
            current.retain(|c| &c.key() != key);
            current.len() != before
        })
    }

    /// Drop every entry of a calendar. Returns how many were removed.
    pub fn remove_calendar(&self, calendar_id: &str) -> usize {
        let mut removed = 0;
        self.tx.send_if_modified(|current| {
            let before = current.len();
            current.retain(|c| c.calendar_id != calendar_id);
            removed = before - current.len();
            removed > 0
        });
        removed
    }
}

fn dedupe(conflicts: Vec<SyncConflict>) -> Vec<SyncConflict> {
    let mut unique: Vec<SyncConflict> = Vec::with_capacity(conflicts.len());
    for conflict in conflicts {
        let key = conflict.key();
        match unique.iter_mut().find(|c| c.key() == key) {
            Some(existing) => *existing = conflict,
            None => unique.push(conflict),
        }
    }
    unique
}
