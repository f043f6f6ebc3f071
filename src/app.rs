//! Wires the config, the file store and the provider gateway together.

use std::sync::Arc;

use anyhow::{Context, Result};
use calsync_core::clock::SystemClock;
use calsync_core::config::SyncConfig;
use calsync_core::context::SyncContext;
use calsync_core::event::Event;
use calsync_core::notify::NoopNotifier;
use calsync_core::remote::ProviderGateway;
use calsync_core::sync::{ConflictSurface, SyncOrchestrator};
use calsync_core::write::EventWriter;
use tracing::debug;

use crate::store::JsonStore;

pub struct App {
    pub config: SyncConfig,
    pub store: Arc<JsonStore>,
    pub ctx: SyncContext,
}

impl App {
    pub fn load() -> Result<Self> {
        let config = SyncConfig::load().context("Failed to load config")?;
        let data_path = config.data_path();
        debug!(data_path = %data_path.display(), "opening store");

        let store = Arc::new(
            JsonStore::open(&data_path)
                .with_context(|| format!("Failed to open store in {}", data_path.display()))?,
        );
        let conflicts = Arc::new(ConflictSurface::with_conflicts(
            store.conflicts().context("Failed to read conflicts")?,
        ));

        let ctx = SyncContext {
            store: store.clone(),
            sources: store.clone(),
            gateway: Arc::new(ProviderGateway::new(config.provider_timeout())),
            conflicts,
            clock: Arc::new(SystemClock),
        };

        Ok(App { config, store, ctx })
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::from_config(self.ctx.clone(), &self.config)
    }

    pub fn writer(&self) -> EventWriter {
        EventWriter::new(self.ctx.clone(), Arc::new(NoopNotifier), Arc::new(NoopNotifier))
            .with_delete_policy(self.config.remote_delete)
    }

    /// Write the conflict surface back so the next invocation sees it.
    pub fn persist_conflicts(&self) -> Result<()> {
        self.store
            .save_conflicts(self.ctx.conflicts.snapshot())
            .context("Failed to save conflicts")
    }

    /// Look up an event by full id or unique id prefix.
    pub fn find_event(&self, id: &str) -> Result<Event> {
        let mut matches = self.store.find_by_id_prefix(id)?;
        match matches.len() {
            0 => anyhow::bail!("No event with id '{}'", id),
            1 => Ok(matches.remove(0)),
            n => anyhow::bail!("'{}' matches {} events, use a longer id", id, n),
        }
    }

    /// Calendar to put a new event in: the one asked for, or the only linked one.
    pub async fn pick_calendar(&self, requested: Option<String>) -> Result<String> {
        if let Some(calendar_id) = requested {
            return Ok(calendar_id);
        }

        let sources = self.ctx.sources.all_sources().await?;
        match sources.as_slice() {
            [only] => Ok(only.calendar_id.clone()),
            [] => anyhow::bail!(
                "No linked calendars.\n\n\
                Link one with:\n  \
                calsync connect <provider> <account>\n\n\
                or name a local calendar with --calendar"
            ),
            many => {
                let available: Vec<_> = many.iter().map(|s| s.calendar_id.as_str()).collect();
                anyhow::bail!(
                    "Multiple calendars found ({}). Use --calendar to specify one.",
                    available.join(", ")
                )
            }
        }
    }
}
