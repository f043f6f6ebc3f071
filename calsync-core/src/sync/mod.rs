//! Reconciliation: classification, passes, and conflict handling.

pub mod accounts;
pub mod classifier;
pub mod conflict;
pub mod orchestrator;
pub mod report;
pub mod resolver;

pub use accounts::Accounts;
pub use classifier::{ChangeKind, classify};
pub use conflict::{ConflictKey, ConflictSurface, SyncConflict, SyncResolutionAction};
pub use orchestrator::{PassMode, SyncOrchestrator};
pub use report::{SourceOutcome, SourceStatus, SyncReport};
pub use resolver::{ConflictResolver, Resolution};
