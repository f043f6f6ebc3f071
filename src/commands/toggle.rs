use anyhow::Result;
use calsync_core::sync::Accounts;

use crate::app::App;

pub async fn run(app: &App, calendar_id: &str, enabled: bool) -> Result<()> {
    Accounts::new(app.ctx.clone())
        .set_sync_enabled(calendar_id, enabled)
        .await?;

    let state = if enabled { "enabled" } else { "disabled" };
    println!("Sync {state} for {calendar_id}");
    Ok(())
}
