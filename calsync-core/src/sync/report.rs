//! Outcome of a sync pass, per calendar source and in aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::sync::classifier::ChangeKind;
use crate::sync::conflict::SyncConflict;
use crate::sync::orchestrator::PassMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Synced,
    Disabled,
    NoCredentials,
    /// Another pass for this source was still running.
    Busy,
    /// The remote listing failed; nothing was changed.
    RemoteUnavailable,
    /// The local listing failed; nothing was changed.
    StoreUnavailable(String),
}

#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub calendar_id: String,
    pub status: SourceStatus,
    /// Applied outcomes. `Conflict` counts pairs found, not resolved.
    pub applied: BTreeMap<ChangeKind, usize>,
    /// Events whose push or store write failed and were left for retry.
    pub failures: usize,
    pub conflicts: Vec<SyncConflict>,
}

impl SourceOutcome {
    pub fn new(calendar_id: &str, status: SourceStatus) -> Self {
        SourceOutcome {
            calendar_id: calendar_id.to_string(),
            status,
            applied: BTreeMap::new(),
            failures: 0,
            conflicts: Vec::new(),
        }
    }

    pub fn record(&mut self, kind: ChangeKind) {
        *self.applied.entry(kind).or_default() += 1;
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.applied.get(&kind).copied().unwrap_or(0)
    }

    /// Anything beyond bookkeeping happened.
    pub fn has_changes(&self) -> bool {
        self.applied
            .iter()
            .any(|(kind, n)| *kind != ChangeKind::Touch && *n > 0)
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub mode: PassMode,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
}

impl SyncReport {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.sources.iter().map(|s| s.count(kind)).sum()
    }

    pub fn failures(&self) -> usize {
        self.sources.iter().map(|s| s.failures).sum()
    }

    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.sources
            .iter()
            .flat_map(|s| s.conflicts.iter().cloned())
            .collect()
    }

    /// (created, updated, deleted) applied to the local store.
    pub fn pull_counts(&self) -> (usize, usize, usize) {
        (
            self.count(ChangeKind::CreateLocal),
            self.count(ChangeKind::PullMerge),
            self.count(ChangeKind::DeleteLocal),
        )
    }

    /// (created, updated) on the remote.
    pub fn push_counts(&self) -> (usize, usize) {
        (
            self.count(ChangeKind::CreateRemote),
            self.count(ChangeKind::PushMerge),
        )
    }
}
