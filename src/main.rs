mod app;
mod commands;
mod dates;
mod render;
mod store;
mod utils;

use anyhow::Result;
use calsync_core::sync::SyncResolutionAction;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::commands::edit::EventChanges;
use crate::commands::new::NewEvent;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Keep your local calendar in sync with remote providers")]
struct Cli {
    /// Log what the sync engine does (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile linked calendars with their providers
    Sync {
        /// Only operate on this calendar
        #[arg(short, long)]
        calendar: Option<String>,

        /// Run as a scheduled pass: conflicts follow `background_conflicts`
        #[arg(long)]
        background: bool,
    },
    /// List conflicts waiting for a decision
    Conflicts,
    /// Settle a conflict
    Resolve {
        /// Number shown by `calsync conflicts`
        index: usize,

        /// local, remote or duplicate
        action: SyncResolutionAction,
    },
    /// Create an event
    New {
        title: String,

        /// Start date/time (e.g., "tomorrow 3pm", "2025-03-20 15:00")
        #[arg(short, long)]
        start: String,

        /// End date/time
        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        /// Length, e.g. "30m" or "2h"
        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Change an event
    Edit {
        /// Event id or unique prefix
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        start: Option<String>,

        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        /// Move the event to another calendar
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Delete an event, remotely first
    Delete {
        /// Event id or unique prefix
        id: String,
    },
    /// Show upcoming events
    Events {
        #[arg(short, long)]
        calendar: Option<String>,

        /// Show events from this date (default: now)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (default: three days after --from)
        #[arg(long)]
        to: Option<String>,
    },
    /// List linked calendars
    Sources,
    /// Link every calendar of a provider account
    Connect {
        provider: String, // e.g. "google"
        account: String,
    },
    /// Unlink a provider account; its events stay as local events
    Disconnect { provider: String, account: String },
    /// Resume syncing a calendar
    Enable { calendar: String },
    /// Pause syncing a calendar
    Disable { calendar: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = App::load()?;

    match cli.command {
        Commands::Sync {
            calendar,
            background,
        } => commands::sync::run(&app, calendar, background, cli.verbose).await,
        Commands::Conflicts => commands::conflicts::run(&app),
        Commands::Resolve { index, action } => commands::resolve::run(&app, index, action).await,
        Commands::New {
            title,
            start,
            end,
            duration,
            location,
            calendar,
        } => {
            let args = NewEvent {
                title,
                start,
                end,
                duration,
                location,
                calendar,
            };
            commands::new::run(&app, args).await
        }
        Commands::Edit {
            id,
            title,
            start,
            end,
            duration,
            location,
            calendar,
        } => {
            let changes = EventChanges {
                title,
                start,
                end,
                duration,
                location,
                calendar,
            };
            commands::edit::run(&app, &id, changes).await
        }
        Commands::Delete { id } => commands::delete::run(&app, &id).await,
        Commands::Events { calendar, from, to } => {
            commands::events::run(&app, calendar, from, to).await
        }
        Commands::Sources => commands::sources::run(&app).await,
        Commands::Connect { provider, account } => {
            commands::connect::run(&app, &provider, &account).await
        }
        Commands::Disconnect { provider, account } => {
            commands::disconnect::run(&app, &provider, &account).await
        }
        Commands::Enable { calendar } => commands::toggle::run(&app, &calendar, true).await,
        Commands::Disable { calendar } => commands::toggle::run(&app, &calendar, false).await,
    }
}
