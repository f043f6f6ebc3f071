//! Colored terminal rendering for calsync types.

use calsync_core::calendar_source::CalendarSource;
use calsync_core::event::{Event, EventSource, ExternalEvent};
use calsync_core::sync::{ChangeKind, SourceOutcome, SourceStatus, SyncConflict};
use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ChangeKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            ChangeKind::CreateLocal | ChangeKind::CreateRemote => symbol.green().to_string(),
            ChangeKind::PullMerge | ChangeKind::PushMerge => symbol.yellow().to_string(),
            ChangeKind::DeleteLocal => symbol.red().to_string(),
            ChangeKind::Conflict => symbol.magenta().to_string(),
            ChangeKind::Touch => symbol.dimmed().to_string(),
        }
    }
}

/// "Wed Mar 12 15:00", or just the date for all-day events.
pub fn format_when(at: DateTime<Utc>, all_day: bool) -> String {
    let local = at.with_timezone(&Local);
    if all_day {
        local.format("%a %b %-d").to_string()
    } else {
        local.format("%a %b %-d %H:%M").to_string()
    }
}

/// First eight characters, enough to pick an event on the command line.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

impl Render for Event {
    fn render(&self) -> String {
        let marker = match (self.source, self.sync_state.is_dirty()) {
            (EventSource::Local, _) => " ",
            (EventSource::Remote, true) => "*",
            (EventSource::Remote, false) => "✓",
        };
        format!(
            "{} {} {}",
            short_id(&self.id).dimmed(),
            marker.cyan(),
            self.content.title
        )
    }
}

impl Render for CalendarSource {
    fn render(&self) -> String {
        let state = if self.sync_enabled {
            "enabled".green().to_string()
        } else {
            "disabled".yellow().to_string()
        };
        let last = self
            .last_synced_at
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "📅 {}  {}  {}  last sync: {}",
            self.calendar_id.bold(),
            self.remote_ref().to_string().dimmed(),
            state,
            last
        )
    }
}

fn render_remote(remote: &ExternalEvent) -> String {
    format!(
        "{} {}",
        remote.summary,
        format_when(remote.start, remote.all_day).dimmed()
    )
}

impl Render for SyncConflict {
    fn render(&self) -> String {
        format!(
            "📅 {}\n      local:  {} {}\n      remote: {}",
            self.calendar_id,
            self.local.content.title,
            format_when(self.local.content.start, self.local.content.all_day).dimmed(),
            render_remote(&self.remote)
        )
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Per-calendar summary of a sync pass.
pub trait OutcomeRender {
    fn render(&self, verbose: bool) -> String;
}

impl OutcomeRender for SourceOutcome {
    fn render(&self, verbose: bool) -> String {
        let mut lines = vec![format!("📅 {}", self.calendar_id)];

        let status = match &self.status {
            SourceStatus::Synced => None,
            SourceStatus::Disabled => Some("sync disabled, skipped".dimmed().to_string()),
            SourceStatus::NoCredentials => {
                Some("no usable credentials, reconnect the account".red().to_string())
            }
            SourceStatus::Busy => Some("another sync is running, skipped".yellow().to_string()),
            SourceStatus::RemoteUnavailable => {
                Some("provider unreachable, nothing changed".red().to_string())
            }
            SourceStatus::StoreUnavailable(e) => {
                Some(format!("local store unavailable: {}", e).red().to_string())
            }
        };
        if let Some(status) = status {
            lines.push(format!("   {}", status));
            return lines.join("\n");
        }

        if !self.has_changes() && self.failures == 0 {
            lines.push(format!("   {}", "No changes".dimmed()));
            return lines.join("\n");
        }

        for (kind, count) in &self.applied {
            if *kind == ChangeKind::Touch && !verbose {
                continue;
            }
            let side = if kind.pushes() { "remote" } else { "local" };
            let label = format!("{} {} ({})", count, pluralize("event", *count), kind);
            let label = if verbose { format!("{} [{}]", label, side) } else { label };
            lines.push(format!("   {} {}", kind.render(), label));
        }

        if self.failures > 0 {
            let label = format!(
                "{} {} left for the next sync",
                self.failures,
                pluralize("change", self.failures)
            );
            lines.push(format!("   {}", label.yellow()));
        }

        lines.join("\n")
    }
}
