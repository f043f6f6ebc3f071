//! Provider subprocess transport.
//!
//! A provider is any executable named `calsync-provider-<name>` on `PATH`
//! that reads one JSON request from stdin and writes one JSON response to
//! stdout. Providers own their credentials and token refresh.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::calendar_source::RemoteCalendarRef;
use crate::date_range::SyncWindow;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{ExternalCalendar, ExternalEvent};
use crate::remote::gateway::RemoteGateway;
use crate::remote::protocol::{
    CheckAccount, Command, CreateEvent, DeleteEvent, ListCalendars, ListEvents, ProviderCommand,
    Request, Response, UpdateEvent,
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Provider {
    name: String,
    timeout: Duration,
    /// Directories searched instead of `PATH`.
    search_path: Option<OsString>,
}

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider {
            name: name.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            search_path: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn binary_path(&self) -> CalSyncResult<PathBuf> {
        let binary_name = format!("calsync-provider-{}", self.name);
        let found = match &self.search_path {
            Some(dirs) => which::which_in(&binary_name, Some(dirs), std::env::current_dir()?),
            None => which::which(&binary_name),
        };
        found.map_err(|_| CalSyncError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command, bounded by the provider timeout.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> CalSyncResult<C::Response> {
        timeout(self.timeout, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| CalSyncError::ProviderTimeout(self.timeout.as_secs()))?
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> CalSyncResult<R> {
        let request = Request {
            command,
            params: serde_json::to_value(params)?,
        };
        let request_json = serde_json::to_string(&request)?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.name, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalSyncError::Provider(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CalSyncError::Provider("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(CalSyncError::Provider(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        parse_response(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_response<R: DeserializeOwned>(raw: &str) -> CalSyncResult<R> {
    if raw.trim().is_empty() {
        return Err(CalSyncError::Provider("Provider returned no response".into()));
    }

    let response: Response<R> = serde_json::from_str(raw)
        .map_err(|e| CalSyncError::Provider(format!("Failed to parse response: {}", e)))?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(CalSyncError::Provider(error)),
    }
}

/// `RemoteGateway` backed by provider binaries, one per provider name.
///
/// Every error is logged and flattened into the gateway's
/// `None`/`false` failure signal.
#[derive(Clone, Debug)]
pub struct ProviderGateway {
    timeout: Duration,
    search_path: Option<OsString>,
}

impl Default for ProviderGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_TIMEOUT)
    }
}

impl ProviderGateway {
    pub fn new(timeout: Duration) -> Self {
        ProviderGateway {
            timeout,
            search_path: None,
        }
    }

    /// Look for provider binaries in `dirs` (a `PATH`-style list) only.
    pub fn with_search_path(mut self, dirs: impl Into<OsString>) -> Self {
        self.search_path = Some(dirs.into());
        self
    }

    fn provider(&self, name: &str) -> Provider {
        Provider::from_name(name)
            .with_timeout(self.timeout)
            .with_search_path(self.search_path.clone())
    }

    async fn call<C: ProviderCommand>(&self, provider: &str, cmd: C) -> Option<C::Response> {
        match self.provider(provider).call(cmd).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%provider, command = ?C::command(), error = %e, "provider call failed");
                None
            }
        }
    }
}

#[async_trait]
impl RemoteGateway for ProviderGateway {
    async fn list_calendars(
        &self,
        provider: &str,
        account_id: &str,
    ) -> Option<Vec<ExternalCalendar>> {
        self.call(
            provider,
            ListCalendars {
                account_id: account_id.to_string(),
            },
        )
        .await
    }

    async fn list_events(
        &self,
        calendar: &RemoteCalendarRef,
        window: &SyncWindow,
    ) -> Option<Vec<ExternalEvent>> {
        self.call(
            &calendar.provider,
            ListEvents {
                target: calendar.into(),
                time_min: window.from_rfc3339(),
                time_max: window.to_rfc3339(),
            },
        )
        .await
    }

    async fn create_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent> {
        self.call(
            &calendar.provider,
            CreateEvent {
                target: calendar.into(),
                event: event.clone(),
            },
        )
        .await
    }

    async fn update_event(
        &self,
        calendar: &RemoteCalendarRef,
        event: &ExternalEvent,
    ) -> Option<ExternalEvent> {
        self.call(
            &calendar.provider,
            UpdateEvent {
                target: calendar.into(),
                event: event.clone(),
            },
        )
        .await
    }

    async fn delete_event(&self, calendar: &RemoteCalendarRef, event_id: &str) -> bool {
        self.call(
            &calendar.provider,
            DeleteEvent {
                target: calendar.into(),
                event_id: event_id.to_string(),
            },
        )
        .await
        .is_some()
    }

    async fn has_credentials(&self, provider: &str, account_id: &str) -> bool {
        self.call(
            provider,
            CheckAccount {
                account_id: account_id.to_string(),
            },
        )
        .await
        .unwrap_or(false)
    }
}
