use anyhow::Result;
use calsync_core::date_range::SyncWindow;
use calsync_core::store::EventStore;
use chrono::{Duration, Local, Utc};
use owo_colors::OwoColorize;

use crate::app::App;
use crate::dates;
use crate::render::Render;

pub async fn run(
    app: &App,
    calendar: Option<String>,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let from = match from {
        Some(from) => dates::parse_when(&from)?.at,
        None => Utc::now(),
    };
    let to = match to {
        Some(to) => dates::parse_when(&to)?.at,
        None => from + Duration::days(3),
    };

    let calendar_ids = match calendar {
        Some(calendar_id) => vec![calendar_id],
        None => app.store.calendar_ids()?,
    };

    let events = app
        .store
        .events_for_calendars_in_range(&app.config.user_id, &calendar_ids, &SyncWindow { from, to })
        .await?;

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let today = Local::now().date_naive();
    let mut current_date = None;

    for event in &events {
        let date = event.content.start.with_timezone(&Local).date_naive();
        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            let label = match (date - today).num_days() {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => date.format("%a %b %-d").to_string(),
            };
            println!("{}", label.bold());
            current_date = Some(date);
        }

        let time = if event.content.all_day {
            "all-day".to_string()
        } else {
            event
                .content
                .start
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string()
        };
        let cal_tag = format!("[{}]", event.calendar_id);
        println!("  {:>7} {} {}", time, event.render(), cal_tag.dimmed());
    }

    Ok(())
}
