use anyhow::Result;
use calsync_core::event::{Event, EventContent, EventSource};
use owo_colors::OwoColorize;

use crate::app::App;
use crate::dates;
use crate::render::short_id;

pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub calendar: Option<String>,
}

pub async fn run(app: &App, args: NewEvent) -> Result<()> {
    let start = dates::parse_when(&args.start)?;
    let end = dates::resolve_end(start, args.end.as_deref(), args.duration.as_deref())?;
    let calendar_id = app.pick_calendar(args.calendar).await?;

    let mut content = EventContent::new(args.title, start.at, end);
    content.all_day = start.all_day;
    content.location = args.location.filter(|l| !l.is_empty());

    let event = Event::new_local(&app.config.user_id, &calendar_id, content);
    let event = app.writer().create(event).await?;

    println!(
        "{} {}",
        format!("Created: {}", event.content.title).green(),
        short_id(&event.id).dimmed()
    );
    print_sync_state(&event);
    Ok(())
}

pub fn print_sync_state(event: &Event) {
    match (event.source, event.sync_state.is_dirty()) {
        (EventSource::Local, _) => {}
        (EventSource::Remote, false) => println!("{}", "  Synced to provider".dimmed()),
        (EventSource::Remote, true) => println!(
            "{}",
            "  Provider not reached; will be pushed on the next sync".yellow()
        ),
    }
}
