use anyhow::Result;
use calsync_core::sync::{ConflictResolver, Resolution, SyncResolutionAction};
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::short_id;

/// `index` is 1-based, as printed by `calsync conflicts`.
pub async fn run(app: &App, index: usize, action: SyncResolutionAction) -> Result<()> {
    let conflicts = app.ctx.conflicts.snapshot();
    let Some(conflict) = index.checked_sub(1).and_then(|i| conflicts.get(i)) else {
        anyhow::bail!(
            "No conflict #{} ({} pending). See `calsync conflicts`.",
            index,
            conflicts.len()
        );
    };

    let resolver = ConflictResolver::new(app.ctx.clone());
    let result = resolver.resolve(conflict, action).await;
    app.persist_conflicts()?;

    match result? {
        Resolution::KeptLocal => println!("{}", "Kept local version".green()),
        Resolution::KeptRemote => println!("{}", "Kept remote version".green()),
        Resolution::Duplicated { duplicate_id } => println!(
            "{} {}",
            "Kept both; remote version saved as".green(),
            short_id(&duplicate_id)
        ),
        Resolution::Deferred => println!(
            "{}",
            "Provider unreachable. The conflict stays open; try again later.".yellow()
        ),
    }

    Ok(())
}
