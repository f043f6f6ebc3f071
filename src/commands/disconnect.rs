use anyhow::Result;
use calsync_core::sync::Accounts;
use owo_colors::OwoColorize;

use crate::app::App;

pub async fn run(app: &App, provider: &str, account_id: &str) -> Result<()> {
    let removed = Accounts::new(app.ctx.clone())
        .unlink(provider, account_id)
        .await?;

    if removed == 0 {
        anyhow::bail!("No calendars linked to {provider}:{account_id}");
    }

    println!(
        "{}",
        format!("Unlinked {removed} calendar(s). Their events stay as local events.").green()
    );
    Ok(())
}
