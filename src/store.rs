//! File-backed store: events, calendar links and open conflicts in one JSON
//! document under the data directory.
//!
//! Several `calsync` processes may share the directory (a scheduled
//! `sync --background` next to an interactive `edit`), so every operation
//! takes an advisory lock on `store.lock` and works on the document as it is
//! on disk at that moment. File I/O and lock waits block the calling task.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calsync_core::calendar_source::CalendarSource;
use calsync_core::date_range::SyncWindow;
use calsync_core::error::{CalSyncError, CalSyncResult};
use calsync_core::event::Event;
use calsync_core::store::{CalendarSourceMap, EventStore};
use calsync_core::sync::SyncConflict;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    events: BTreeMap<String, Event>,
    #[serde(default)]
    sources: BTreeMap<String, CalendarSource>,
    #[serde(default)]
    conflicts: Vec<SyncConflict>,
}

pub struct JsonStore {
    path: PathBuf,
    /// Advisory lock shared with other processes. The mutex orders this
    /// process's own users of the handle.
    lock_file: Mutex<File>,
    revision: watch::Sender<u64>,
}

/// Releases the advisory lock when dropped.
struct DirLock<'a> {
    file: &'a File,
}

impl Drop for DirLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

fn store_error(path: &Path, e: impl std::fmt::Display) -> CalSyncError {
    CalSyncError::Store(format!("{}: {}", path.display(), e))
}

fn load(path: &Path) -> CalSyncResult<Document> {
    if !path.exists() {
        return Ok(Document::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| store_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| store_error(path, e))
}

/// Write through a temp file and rename, so a crash never leaves the
/// document half written.
fn save(path: &Path, doc: &Document) -> CalSyncResult<()> {
    let content = serde_json::to_string_pretty(doc)?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, content).map_err(|e| store_error(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| store_error(path, e))
}

impl JsonStore {
    /// Open the store in `dir`, starting empty if there is no file yet.
    pub fn open(dir: &Path) -> CalSyncResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| store_error(dir, e))?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| store_error(&lock_path, e))?;

        let (revision, _) = watch::channel(0);
        let store = JsonStore {
            path: dir.join(STORE_FILE),
            lock_file: Mutex::new(lock_file),
            revision,
        };

        // Surface a corrupt document now rather than on first use
        store.read(|_| ())?;
        Ok(store)
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> CalSyncResult<T> {
        let file = self.lock_file.lock();
        FileExt::lock_shared(&*file).map_err(|e| store_error(&self.path, e))?;
        let _held = DirLock { file: &file };

        let doc = load(&self.path)?;
        Ok(f(&doc))
    }

    /// Re-read the document under the exclusive lock, apply `f` to it and
    /// write it back. Nothing is written when `f` leaves the document as it
    /// was. Returns `f`'s result and whether the events changed.
    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> T) -> CalSyncResult<(T, bool)> {
        let file = self.lock_file.lock();
        FileExt::lock_exclusive(&*file).map_err(|e| store_error(&self.path, e))?;
        let _held = DirLock { file: &file };

        let current = load(&self.path)?;
        let mut next = current.clone();
        let out = f(&mut next);

        if next == current {
            return Ok((out, false));
        }

        save(&self.path, &next)?;
        debug!(path = %self.path.display(), "store written");
        Ok((out, next.events != current.events))
    }

    fn mutate_events<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Event>) -> T) -> CalSyncResult<T> {
        let (out, changed) = self.mutate(|doc| f(&mut doc.events))?;
        if changed {
            self.revision.send_modify(|r| *r += 1);
        }
        Ok(out)
    }

    pub fn conflicts(&self) -> CalSyncResult<Vec<SyncConflict>> {
        self.read(|doc| doc.conflicts.clone())
    }

    pub fn save_conflicts(&self, conflicts: Vec<SyncConflict>) -> CalSyncResult<()> {
        self.mutate(|doc| doc.conflicts = conflicts).map(|_| ())
    }

    /// Every calendar id that has events or a link.
    pub fn calendar_ids(&self) -> CalSyncResult<Vec<String>> {
        self.read(|doc| {
            let mut ids: Vec<String> = doc
                .events
                .values()
                .map(|e| e.calendar_id.clone())
                .chain(doc.sources.keys().cloned())
                .collect();
            ids.sort();
            ids.dedup();
            ids
        })
    }

    /// Events whose id starts with `prefix`.
    pub fn find_by_id_prefix(&self, prefix: &str) -> CalSyncResult<Vec<Event>> {
        self.read(|doc| {
            doc.events
                .values()
                .filter(|e| e.id.starts_with(prefix))
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl EventStore for JsonStore {
    async fn events_for_calendars_in_range(
        &self,
        user_id: &str,
        calendar_ids: &[String],
        window: &SyncWindow,
    ) -> CalSyncResult<Vec<Event>> {
        self.read(|doc| {
            let mut events: Vec<Event> = doc
                .events
                .values()
                .filter(|e| e.user_id == user_id && calendar_ids.contains(&e.calendar_id))
                .filter(|e| window.overlaps(e.content.start, e.content.end))
                .cloned()
                .collect();
            events.sort_by_key(|e| e.content.start);
            events
        })
    }

    async fn events_in_calendar(&self, calendar_id: &str) -> CalSyncResult<Vec<Event>> {
        self.read(|doc| {
            doc.events
                .values()
                .filter(|e| e.calendar_id == calendar_id)
                .cloned()
                .collect()
        })
    }

    async fn get_event(&self, id: &str) -> CalSyncResult<Option<Event>> {
        self.read(|doc| doc.events.get(id).cloned())
    }

    async fn event_by_external_id(
        &self,
        calendar_id: &str,
        external_id: &str,
    ) -> CalSyncResult<Option<Event>> {
        self.read(|doc| {
            doc.events
                .values()
                .find(|e| {
                    e.calendar_id == calendar_id && e.external_id.as_deref() == Some(external_id)
                })
                .cloned()
        })
    }

    async fn add_event(&self, event: &Event) -> CalSyncResult<()> {
        self.mutate_events(|events| {
            events.insert(event.id.clone(), event.clone());
        })
    }

    async fn update_event(&self, event: &Event) -> CalSyncResult<()> {
        let found = self.mutate_events(|events| match events.get_mut(&event.id) {
            Some(stored) => {
                *stored = event.clone();
                true
            }
            None => false,
        })?;

        if !found {
            return Err(CalSyncError::EventNotFound(event.id.clone()));
        }
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> CalSyncResult<()> {
        self.mutate_events(|events| {
            events.remove(id);
        })
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[async_trait]
impl CalendarSourceMap for JsonStore {
    async fn source_for_calendar(
        &self,
        calendar_id: &str,
    ) -> CalSyncResult<Option<CalendarSource>> {
        self.read(|doc| doc.sources.get(calendar_id).cloned())
    }

    async fn all_sources(&self) -> CalSyncResult<Vec<CalendarSource>> {
        self.read(|doc| doc.sources.values().cloned().collect())
    }

    async fn upsert(&self, source: &CalendarSource) -> CalSyncResult<()> {
        self.mutate(|doc| {
            doc.sources
                .insert(source.calendar_id.clone(), source.clone());
        })
        .map(|_| ())
    }

    async fn delete_by_account(&self, provider: &str, account_id: &str) -> CalSyncResult<usize> {
        self.mutate(|doc| {
            let before = doc.sources.len();
            doc.sources
                .retain(|_, s| !(s.provider == provider && s.provider_account_id == account_id));
            before - doc.sources.len()
        })
        .map(|(removed, _)| removed)
    }

    async fn delete_by_calendar(&self, calendar_id: &str) -> CalSyncResult<bool> {
        self.mutate(|doc| doc.sources.remove(calendar_id).is_some())
            .map(|(existed, _)| existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_core::event::EventContent;
    use chrono::{Duration, Utc};

    fn event(calendar_id: &str, title: &str) -> Event {
        let now = Utc::now();
        Event::new_local("me", calendar_id, EventContent::new(title, now, now + Duration::hours(1)))
    }

    #[tokio::test]
    async fn test_events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let stored = event("work", "Planning");

        {
            let store = JsonStore::open(dir.path()).unwrap();
            store.add_event(&stored).await.unwrap();
            store
                .upsert(&CalendarSource::new("work", "google", "me@example.com", "primary"))
                .await
                .unwrap();
        }

        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.get_event(&stored.id).await.unwrap(), Some(stored));
        assert!(store.source_for_calendar("work").await.unwrap().is_some());
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_update_of_missing_event_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let mut revisions = store.watch();
        let _ = revisions.borrow_and_update();

        let result = store.update_event(&event("work", "Ghost")).await;

        assert!(matches!(result, Err(CalSyncError::EventNotFound(_))));
        assert!(!revisions.has_changed().unwrap());
        assert!(!dir.path().join("store.json").exists());
    }

    #[tokio::test]
    async fn test_two_handles_keep_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let background = JsonStore::open(dir.path()).unwrap();
        let interactive = JsonStore::open(dir.path()).unwrap();
        let pulled = event("work", "Pulled by sync");
        let typed = event("work", "Typed by user");

        background.add_event(&pulled).await.unwrap();
        interactive.add_event(&typed).await.unwrap();
        background
            .upsert(&CalendarSource::new("work", "google", "me@example.com", "primary"))
            .await
            .unwrap();

        assert_eq!(interactive.get_event(&pulled.id).await.unwrap(), Some(pulled.clone()));
        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_event(&pulled.id).await.unwrap(), Some(pulled));
        assert_eq!(reopened.get_event(&typed.id).await.unwrap(), Some(typed));
        assert_eq!(reopened.all_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let writers: Vec<_> = (0..4)
            .map(|n| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = JsonStore::open(&path).unwrap();
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .build()
                        .unwrap();
                    for i in 0..5 {
                        let e = event("work", &format!("writer {n} event {i}"));
                        runtime.block_on(store.add_event(&e)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let store = JsonStore::open(&path).unwrap();
        assert_eq!(store.events_in_calendar("work").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let lost = event("work", "Never saved");
        let saved = event("work", "Saved");

        // A directory where the temp file goes makes the write fail
        let temp = dir.path().join("store.json.tmp");
        std::fs::create_dir(&temp).unwrap();
        assert!(matches!(store.add_event(&lost).await, Err(CalSyncError::Store(_))));
        std::fs::remove_dir(&temp).unwrap();

        store.add_event(&saved).await.unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_event(&lost.id).await.unwrap(), None);
        assert!(reopened.get_event(&saved.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_conflicts_persist() {
        let dir = tempfile::tempdir().unwrap();
        let local = event("work", "Local");
        let now = Utc::now();
        let remote = calsync_core::event::ExternalEvent {
            id: "r1".to_string(),
            summary: "Remote".to_string(),
            description: None,
            location: None,
            start: now,
            end: now,
            all_day: false,
            updated_at: now,
            cancelled: false,
        };

        JsonStore::open(dir.path())
            .unwrap()
            .save_conflicts(vec![SyncConflict::new("work", local, remote)])
            .unwrap();

        let conflicts = JsonStore::open(dir.path()).unwrap().conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].remote.id, "r1");
    }

    #[tokio::test]
    async fn test_calendar_ids_and_prefix_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let planning = event("work", "Planning");
        store.add_event(&planning).await.unwrap();
        store
            .upsert(&CalendarSource::new("home", "google", "me@example.com", "family"))
            .await
            .unwrap();

        assert_eq!(store.calendar_ids().unwrap(), vec!["home".to_string(), "work".to_string()]);
        assert_eq!(store.find_by_id_prefix(&planning.id[..8]).unwrap(), vec![planning]);
    }
}
