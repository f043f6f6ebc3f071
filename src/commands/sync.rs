use anyhow::Result;
use calsync_core::sync::PassMode;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::OutcomeRender;
use crate::utils::tui;

pub async fn run(app: &App, calendar: Option<String>, background: bool, verbose: bool) -> Result<()> {
    let mode = if background {
        PassMode::Background
    } else {
        PassMode::Manual
    };
    let orchestrator = app.orchestrator();

    let spinner = tui::create_spinner("Syncing");
    let result = match &calendar {
        Some(calendar_id) => orchestrator.run_calendar(calendar_id, mode).await,
        None => orchestrator.run(mode).await,
    };
    spinner.finish_and_clear();
    let report = result?;

    app.persist_conflicts()?;

    if report.sources.is_empty() {
        println!(
            "{}",
            "No linked calendars. Link one with `calsync connect <provider> <account>`".dimmed()
        );
        return Ok(());
    }

    for (i, outcome) in report.sources.iter().enumerate() {
        println!("{}", outcome.render(verbose));
        if i < report.sources.len() - 1 {
            println!();
        }
    }

    let (pull_created, pull_updated, pull_deleted) = report.pull_counts();
    let (push_created, push_updated) = report.push_counts();

    if pull_created > 0 || pull_updated > 0 || pull_deleted > 0 {
        println!(
            "\nPulled: {} created, {} updated, {} deleted",
            pull_created, pull_updated, pull_deleted
        );
    }

    if push_created > 0 || push_updated > 0 {
        println!("Pushed: {} created, {} updated", push_created, push_updated);
    }

    let pending = app.ctx.conflicts.len();
    if pending > 0 {
        let label = format!(
            "\n{} conflict(s) need a decision. See `calsync conflicts`.",
            pending
        );
        println!("{}", label.magenta());
    }

    Ok(())
}
