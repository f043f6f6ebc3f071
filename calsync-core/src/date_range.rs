//! The time window a sync pass covers.

use chrono::{DateTime, Days, Months, NaiveTime, Utc};

pub const DEFAULT_PAST_DAYS: u64 = 30;
pub const DEFAULT_FUTURE_MONTHS: u32 = 6;

/// Closed range of instants. Both local and remote listings of a pass use
/// the same window, fixed when the pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl SyncWindow {
    /// `[start of today - 30 days, end of today + 6 months]`
    pub fn around(now: DateTime<Utc>) -> Self {
        Self::with_span(now, DEFAULT_PAST_DAYS, DEFAULT_FUTURE_MONTHS)
    }

    pub fn with_span(now: DateTime<Utc>, past_days: u64, future_months: u32) -> Self {
        let today = now.date_naive();
        let start_of_day = today.and_time(NaiveTime::MIN).and_utc();
        let end_of_day = today
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc())
            .unwrap_or(start_of_day);

        SyncWindow {
            from: start_of_day
                .checked_sub_days(Days::new(past_days))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: end_of_day
                .checked_add_months(Months::new(future_months))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// An event overlaps the window if it starts before the window ends and
    /// ends after the window starts.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.to && end >= self.from
    }

    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339()
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_bounds() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 15, 30, 0).unwrap();
        let window = SyncWindow::around(now);

        assert_eq!(window.from, Utc.with_ymd_and_hms(2025, 2, 18, 0, 0, 0).unwrap());
        assert_eq!(window.to, Utc.with_ymd_and_hms(2025, 9, 20, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_overlaps() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 15, 30, 0).unwrap();
        let window = SyncWindow::around(now);

        let inside = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
        assert!(window.overlaps(inside, inside));

        let long_ago = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert!(!window.overlaps(long_ago, long_ago));

        // Started before the window, still running inside it
        let running_until = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(window.overlaps(long_ago, running_until));
    }
}
