use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;

pub fn run(app: &App) -> Result<()> {
    let conflicts = app.ctx.conflicts.snapshot();

    if conflicts.is_empty() {
        println!("{}", "No conflicts".dimmed());
        return Ok(());
    }

    for (i, conflict) in conflicts.iter().enumerate() {
        println!("{} {}", format!("[{}]", i + 1).bold(), conflict.render());
    }

    println!(
        "\n{}",
        "Resolve with `calsync resolve <n> <local|remote|duplicate>`".dimmed()
    );
    Ok(())
}
