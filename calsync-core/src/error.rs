//! Error types for calsync.

use thiserror::Error;

/// Reasons a direct write is rejected before anything is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event title must not be blank")]
    BlankTitle,

    #[error("Event must belong to a calendar")]
    BlankCalendarId,

    #[error("Event ends before it starts")]
    EndBeforeStart,
}

/// Errors that can occur in calsync operations.
#[derive(Error, Debug)]
pub enum CalSyncError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("No calendar source for calendar '{0}'")]
    SourceNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Remote calendar unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote delete failed for event '{0}', local copy kept")]
    RemoteDeleteFailed(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CalSyncError {
    fn from(e: serde_json::Error) -> Self {
        CalSyncError::Serialization(e.to_string())
    }
}

/// Result type alias for calsync operations.
pub type CalSyncResult<T> = Result<T, CalSyncError>;
