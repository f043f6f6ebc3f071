use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;

pub async fn run(app: &App) -> Result<()> {
    let sources = app.ctx.sources.all_sources().await?;

    if sources.is_empty() {
        println!("{}", "No linked calendars".dimmed());
        return Ok(());
    }

    for source in &sources {
        println!("{}", source.render());
    }
    Ok(())
}
