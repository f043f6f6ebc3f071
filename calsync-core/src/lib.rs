//! Reconciliation between a local event store and remote calendar providers.
//!
//! The local store is authoritative. Each linked calendar is reconciled
//! against its provider calendar inside a time window:
//! - `sync` holds the classifier, the orchestrator and conflict handling
//! - `write` is the direct create/update/delete path
//! - `remote` talks to providers over the subprocess protocol

pub mod calendar_source;
pub mod clock;
pub mod config;
pub mod context;
pub mod date_range;
pub mod error;
pub mod event;
pub mod notify;
pub mod remote;
pub mod store;
pub mod sync;
pub mod write;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use calendar_source::{CalendarSource, RemoteCalendarRef};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackgroundConflictPolicy, RemoteDeletePolicy, SyncConfig};
pub use context::SyncContext;
pub use date_range::SyncWindow;
pub use error::{CalSyncError, CalSyncResult, ValidationError};
pub use event::*;
pub use write::EventWriter;
