//! Natural-language start/end parsing for `new` and `edit`.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// A parsed point in time. Inputs without a time of day mean the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct When {
    pub at: DateTime<Utc>,
    pub all_day: bool,
}

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("mon", "monday"),
    ("tue", "tuesday"),
    ("tues", "tuesday"),
    ("wed", "wednesday"),
    ("thu", "thursday"),
    ("thur", "thursday"),
    ("thurs", "thursday"),
    ("fri", "friday"),
    ("sat", "saturday"),
    ("sun", "sunday"),
    ("jan", "january"),
    ("feb", "february"),
    ("mar", "march"),
    ("apr", "april"),
    ("jun", "june"),
    ("jul", "july"),
    ("aug", "august"),
    ("sep", "september"),
    ("sept", "september"),
    ("oct", "october"),
    ("nov", "november"),
    ("dec", "december"),
];

/// fuzzydate only knows full day and month names.
fn expand(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == word)
                .map_or(word, |(_, full)| *full)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the input names a time of day ("3pm", "15:30", "noon", "at 9").
fn mentions_time(input: &str) -> bool {
    let lower = input.to_lowercase();
    if lower.contains("noon") || lower.contains("midnight") {
        return true;
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    words.iter().enumerate().any(|(i, word)| {
        let digits_then = |suffix: &str| {
            word.strip_suffix(suffix)
                .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
        };
        let clock = word
            .split_once(':')
            .is_some_and(|(h, m)| {
                h.ends_with(|c: char| c.is_ascii_digit()) && m.starts_with(|c: char| c.is_ascii_digit())
            });
        let meridiem = (*word == "am" || *word == "pm")
            && i > 0
            && words[i - 1].chars().all(|c| c.is_ascii_digit());
        let at_hour = *word == "at"
            && words
                .get(i + 1)
                .is_some_and(|next| next.starts_with(|c: char| c.is_ascii_digit()));

        digits_then("am") || digits_then("pm") || clock || meridiem || at_hour
    })
}

fn to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{} does not exist in the local time zone", naive))
}

pub fn parse_when(input: &str) -> Result<When> {
    let naive = fuzzydate::parse(&expand(input))
        .map_err(|_| anyhow::anyhow!("Could not parse date/time: \"{}\"", input))?;

    if mentions_time(input) {
        Ok(When {
            at: to_utc(naive)?,
            all_day: false,
        })
    } else {
        Ok(When {
            at: to_utc(naive.date().and_time(NaiveTime::MIN))?,
            all_day: true,
        })
    }
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std = humantime::parse_duration(input).map_err(|e| anyhow::anyhow!("{}", e))?;
    Duration::from_std(std).context("Duration too large")
}

/// End of an event: an explicit end, a duration, or one hour (one day for
/// all-day events) after the start.
pub fn resolve_end(start: When, end: Option<&str>, duration: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(end) = end {
        let cleaned = end
            .strip_prefix("until ")
            .or_else(|| end.strip_prefix("to "))
            .unwrap_or(end);
        return Ok(parse_when(cleaned)?.at);
    }

    if let Some(duration) = duration {
        let length = parse_duration(duration)
            .with_context(|| format!("Could not parse duration: \"{}\"", duration))?;
        return Ok(start.at + length);
    }

    Ok(if start.all_day {
        start.at + Duration::days(1)
    } else {
        start.at + Duration::hours(1)
    })
}
