//! Sums console session time inside the "today" and "this week" windows.
//!
//! All instants are naive local wall-clock times, as printed by `last`.

use crate::parse::{parse_log, LoginRecord, DEFAULT_CONSOLE_MARKER};
use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta};
use hostpulse_core::{format, SensorOutput};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Midnight of the current day up to `now`.
    #[must_use]
    pub fn today(now: NaiveDateTime) -> Self {
        Self {
            start: now.date().and_time(NaiveTime::MIN),
            end: now,
        }
    }

    /// Midnight of the most recent Monday up to `now`.
    #[must_use]
    pub fn this_week(now: NaiveDateTime) -> Self {
        let since_monday = i64::from(now.weekday().num_days_from_monday());
        Self {
            start: (now.date() - TimeDelta::days(since_monday)).and_time(NaiveTime::MIN),
            end: now,
        }
    }

    /// Length of the part of `[start, end)` inside this window.
    #[must_use]
    pub fn overlap(&self, start: NaiveDateTime, end: NaiveDateTime) -> TimeDelta {
        let from = start.max(self.start);
        let to = end.min(self.end);
        if to > from {
            to - from
        } else {
            TimeDelta::zero()
        }
    }
}

fn as_human<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format::optional_duration_to_human(*duration))
}

/// Console time for today and this week.
///
/// Either both totals are known or neither is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoginTimes {
    #[serde(serialize_with = "as_human")]
    today: Option<Duration>,
    #[serde(serialize_with = "as_human")]
    week: Option<Duration>,
}

impl LoginTimes {
    #[must_use]
    pub const fn new(today: Duration, week: Duration) -> Self {
        Self {
            today: Some(today),
            week: Some(week),
        }
    }

    /// Both totals shown as `N/A`.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            today: None,
            week: None,
        }
    }

    #[must_use]
    pub const fn today(&self) -> Option<Duration> {
        self.today
    }

    #[must_use]
    pub const fn week(&self) -> Option<Duration> {
        self.week
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.today.is_some()
    }

    #[must_use]
    pub fn today_text(&self) -> String {
        format::optional_duration_to_human(self.today)
    }

    #[must_use]
    pub fn week_text(&self) -> String {
        format::optional_duration_to_human(self.week)
    }
}

impl From<LoginTimes> for SensorOutput {
    fn from(times: LoginTimes) -> Self {
        SensorOutput::new(format!("{} / {}", times.today_text(), times.week_text())).with_tooltip(
            format!(
                "Today: {}\nThis week: {}",
                times.today_text(),
                times.week_text()
            ),
        )
    }
}

/// Total the records' overlap with today's and this week's windows.
///
/// Records that ended before the week started are ignored.
#[must_use]
pub fn aggregate_records(records: &[LoginRecord], now: NaiveDateTime) -> LoginTimes {
    let day = TimeWindow::today(now);
    let week = TimeWindow::this_week(now);

    let (today, this_week) = records
        .iter()
        .map(|record| (record.login, record.logout_at(now)))
        .filter(|&(_, logout)| logout >= week.start)
        .fold((TimeDelta::zero(), TimeDelta::zero()), |(t, w), (login, logout)| {
            (t + day.overlap(login, logout), w + week.overlap(login, logout))
        });

    LoginTimes::new(
        today.to_std().unwrap_or_default(),
        this_week.to_std().unwrap_or_default(),
    )
}

/// Parse `last` output and total its console sessions.
#[must_use]
pub fn compute_login_times(raw_log_text: &str, now: NaiveDateTime) -> LoginTimes {
    compute_login_times_with_marker(raw_log_text, DEFAULT_CONSOLE_MARKER, now)
}

/// [`compute_login_times`] for a non-default terminal marker.
#[must_use]
pub fn compute_login_times_with_marker(
    raw_log_text: &str,
    marker: &str,
    now: NaiveDateTime,
) -> LoginTimes {
    aggregate_records(&parse_log(raw_log_text, marker, now), now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    const HOUR: u64 = 3600;

    // Wednesday
    fn wednesday_afternoon() -> NaiveDateTime {
        at(2025, 10, 15, 15, 0)
    }

    #[test]
    fn test_windows() {
        let now = wednesday_afternoon();
        assert_eq!(TimeWindow::today(now).start, at(2025, 10, 15, 0, 0));
        assert_eq!(TimeWindow::this_week(now).start, at(2025, 10, 13, 0, 0));

        // On a Monday both windows start at the same midnight
        let monday = at(2025, 10, 13, 8, 0);
        assert_eq!(TimeWindow::this_week(monday).start, TimeWindow::today(monday).start);

        // Sunday belongs to the week that began six days earlier
        let sunday = at(2025, 10, 19, 23, 59);
        assert_eq!(TimeWindow::this_week(sunday).start, at(2025, 10, 13, 0, 0));
    }

    #[test]
    fn test_overlap() {
        let window = TimeWindow::today(wednesday_afternoon());
        assert_eq!(
            window.overlap(at(2025, 10, 14, 22, 0), at(2025, 10, 15, 2, 0)),
            TimeDelta::hours(2)
        );
        assert_eq!(
            window.overlap(at(2025, 10, 14, 8, 0), at(2025, 10, 14, 9, 0)),
            TimeDelta::zero()
        );
    }

    #[test]
    fn test_monday_session_counts_for_week_only() {
        let log = "alice console Mon Oct 13 09:00 - 17:00  (08:00)\n";
        let times = compute_login_times(log, wednesday_afternoon());
        assert_eq!(times.today(), Some(Duration::ZERO));
        assert_eq!(times.week(), Some(Duration::from_secs(8 * HOUR)));
        assert_eq!(times.today_text(), "0m");
        assert_eq!(times.week_text(), "8h 0m");
    }

    #[test]
    fn test_session_with_source_host_counts() {
        let with_host = "alice console 192.168.1.5 Mon Oct 13 09:00 - 17:00  (08:00)\n";
        let without_host = "alice console Mon Oct 13 09:00 - 17:00  (08:00)\n";
        let now = wednesday_afternoon();
        assert_eq!(
            compute_login_times(with_host, now),
            compute_login_times(without_host, now)
        );
        assert_eq!(
            compute_login_times(with_host, now).week(),
            Some(Duration::from_secs(8 * HOUR))
        );
    }

    #[test]
    fn test_still_logged_in_runs_until_now() {
        let log = "\
alice console Tue Oct 14 20:00   still logged in
";
        let times = compute_login_times(log, wednesday_afternoon());
        // today: 00:00 to 15:00
        assert_eq!(times.today(), Some(Duration::from_secs(15 * HOUR)));
        assert_eq!(times.week(), Some(Duration::from_secs(19 * HOUR)));
    }

    #[test]
    fn test_sessions_before_week_are_discarded() {
        let log = "\
alice console Fri Oct 10 09:00 - 17:00  (08:00)
alice console Sun Oct 12 22:00 - 01:30  (03:30)
";
        let times = compute_login_times(log, wednesday_afternoon());
        assert_eq!(times.today(), Some(Duration::ZERO));
        // Only the part after Monday midnight counts
        assert_eq!(times.week(), Some(Duration::from_secs(HOUR + 30 * 60)));
        assert_eq!(times.week_text(), "1h 30m");
    }

    #[test]
    fn test_malformed_lines_do_not_affect_others() {
        let log = "\
alice console Wed Oct 15 09:00 - 09:45  (00:45)
alice console Wed Oct
alice console Wed Oct 15 10:00 - 10:20  (00:20)
";
        let times = compute_login_times(log, wednesday_afternoon());
        assert_eq!(times.today(), Some(Duration::from_secs(65 * 60)));
        assert_eq!(times.today_text(), "1h 5m");
    }

    #[test]
    fn test_empty_history() {
        let times = compute_login_times("", wednesday_afternoon());
        assert_eq!(times, LoginTimes::new(Duration::ZERO, Duration::ZERO));
        assert!(times.is_available());
    }

    #[test]
    fn test_unavailable_serializes_as_sentinel() {
        let json = serde_json::to_string(&LoginTimes::unavailable()).unwrap();
        assert_eq!(json, r#"{"today":"N/A","week":"N/A"}"#);

        let json = serde_json::to_string(&LoginTimes::new(
            Duration::from_secs(90 * 60),
            Duration::from_secs(25 * HOUR),
        ))
        .unwrap();
        assert_eq!(json, r#"{"today":"1h 30m","week":"25h 0m"}"#);
    }

    #[test]
    fn test_sensor_output() {
        let output = SensorOutput::from(LoginTimes::new(
            Duration::from_secs(45 * 60),
            Duration::from_secs(26 * HOUR + 60),
        ));
        assert_eq!(output.text, "45m / 26h 1m");
        assert_eq!(output.tooltip.as_deref(), Some("Today: 45m\nThis week: 26h 1m"));
        assert_eq!(SensorOutput::from(LoginTimes::unavailable()).text, "N/A / N/A");
    }

    #[test]
    fn test_totals_bounded_by_windows() {
        let log = "\
alice console Mon Oct 13 00:00 - 15:00  (2+15:00)
alice console Tue Oct 14 12:00   still logged in
";
        let now = wednesday_afternoon();
        let times = compute_login_times(log, now);
        let day = TimeWindow::today(now);
        let week = TimeWindow::this_week(now);
        let today = times.today().unwrap();
        let this_week = times.week().unwrap();

        assert!(today <= this_week);
        // Each record is bounded by the window length
        assert!(today <= 2 * (day.end - day.start).to_std().unwrap());
        assert!(this_week <= 2 * (week.end - week.start).to_std().unwrap());
    }
}
