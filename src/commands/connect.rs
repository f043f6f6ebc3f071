use anyhow::{Context, Result};
use calsync_core::sync::Accounts;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::utils::tui;

pub async fn run(app: &App, provider: &str, account_id: &str) -> Result<()> {
    let accounts = Accounts::new(app.ctx.clone());

    let spinner = tui::create_spinner(format!("Connecting to {provider}..."));
    let result = accounts.link(provider, account_id).await;
    spinner.finish_and_clear();

    let linked = result.with_context(|| format!("Failed to list calendars of {account_id}"))?;

    if linked.is_empty() {
        println!("{}", "All calendars of this account are already linked".dimmed());
        return Ok(());
    }

    for source in &linked {
        println!(
            "{} {} {}",
            "+".green(),
            source.calendar_id,
            format!("({})", source.remote_ref()).dimmed()
        );
    }
    println!("\nRun `calsync sync` to pull their events.");
    Ok(())
}
