use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::commands::new::print_sync_state;
use crate::dates;

pub struct EventChanges {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub calendar: Option<String>,
}

pub async fn run(app: &App, id: &str, changes: EventChanges) -> Result<()> {
    let mut event = app.find_event(id)?;
    let content = &mut event.content;

    if let Some(title) = changes.title {
        content.title = title;
    }
    if let Some(location) = changes.location {
        content.location = Some(location).filter(|l| !l.is_empty());
    }

    // A new start keeps the old length unless an end or duration is given
    let length = content.end - content.start;
    if let Some(start) = changes.start {
        let start = dates::parse_when(&start)?;
        content.start = start.at;
        content.all_day = start.all_day;
        content.end = start.at + length;
    }
    if changes.end.is_some() || changes.duration.is_some() {
        let start = dates::When {
            at: content.start,
            all_day: content.all_day,
        };
        content.end = dates::resolve_end(start, changes.end.as_deref(), changes.duration.as_deref())?;
    }

    if let Some(calendar_id) = changes.calendar {
        event.calendar_id = calendar_id;
    }

    let event = app.writer().update(event).await?;

    println!("{}", format!("Updated: {}", event.content.title).green());
    print_sync_state(&event);
    Ok(())
}
