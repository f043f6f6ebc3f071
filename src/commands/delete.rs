use anyhow::Result;
use calsync_core::error::CalSyncError;
use owo_colors::OwoColorize;

use crate::app::App;

pub async fn run(app: &App, id: &str) -> Result<()> {
    let event = app.find_event(id)?;

    match app.writer().delete(&event.id).await {
        Ok(()) => {
            println!("{}", format!("Deleted: {}", event.content.title).red());
            Ok(())
        }
        Err(CalSyncError::RemoteDeleteFailed(_)) => anyhow::bail!(
            "Could not delete \"{}\" from the provider, so it was kept locally.\n\
            Try again once the provider is reachable, or set remote_delete = \"fail_open\" in the config.",
            event.content.title
        ),
        Err(e) => Err(e.into()),
    }
}
