//! Collaborators shared by the sync pass, the resolver and the write path.

use std::sync::Arc;

use crate::clock::Clock;
use crate::remote::RemoteGateway;
use crate::store::{CalendarSourceMap, EventStore};
use crate::sync::conflict::ConflictSurface;

/// Everything reconciliation touches, injected at construction time.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn EventStore>,
    pub sources: Arc<dyn CalendarSourceMap>,
    pub gateway: Arc<dyn RemoteGateway>,
    pub conflicts: Arc<ConflictSurface>,
    pub clock: Arc<dyn Clock>,
}
