//! Mapping of local calendars to provider calendars.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a local calendar to one calendar of one provider account.
///
/// A calendar without a `CalendarSource` is purely local and never takes
/// part in reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub calendar_id: String,
    /// Provider name, e.g. "google"
    pub provider: String,
    pub provider_calendar_id: String,
    pub provider_account_id: String,
    pub sync_enabled: bool,
    /// When the last pass for this calendar finished
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CalendarSource {
    pub fn new(
        calendar_id: &str,
        provider: &str,
        provider_account_id: &str,
        provider_calendar_id: &str,
    ) -> Self {
        CalendarSource {
            calendar_id: calendar_id.to_string(),
            provider: provider.to_string(),
            provider_calendar_id: provider_calendar_id.to_string(),
            provider_account_id: provider_account_id.to_string(),
            sync_enabled: true,
            last_synced_at: None,
        }
    }

    pub fn remote_ref(&self) -> RemoteCalendarRef {
        RemoteCalendarRef {
            provider: self.provider.clone(),
            account_id: self.provider_account_id.clone(),
            calendar_id: self.provider_calendar_id.clone(),
        }
    }
}

/// Addresses a calendar on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteCalendarRef {
    pub provider: String,
    pub account_id: String,
    pub calendar_id: String,
}

impl fmt::Display for RemoteCalendarRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}/{}", self.provider, self.account_id, self.calendar_id)
    }
}
