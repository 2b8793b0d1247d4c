//! Turns `last` output into login records.
//!
//! A console line looks like
//!
//! ```text
//! alice     console                   Mon Oct 13 09:02 - 17:30  (08:28)
//! alice     console                   Wed Oct 15 08:47   still logged in
//! ```
//!
//! The date carries no year. It is placed in the year of `now`, or the year
//! before if that would put it in the future.

use crate::error::{Result, SessionError};
use chrono::{Datelike, NaiveDateTime, TimeDelta, Weekday};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// Terminal field of a local graphical login.
pub const DEFAULT_CONSOLE_MARKER: &str = "console";

const STILL_LOGGED_IN: &str = "still logged in";

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("Invalid parenthesized token pattern"));

static SESSION_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{1,6})\+)?(\d{1,6}):(\d{2})$").expect("Invalid session duration pattern")
});

/// End of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logout {
    /// The session has not ended.
    StillActive,
    At(NaiveDateTime),
}

/// One console session recovered from the login history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRecord {
    pub login: NaiveDateTime,
    pub logout: Logout,
    pub line: String,
}

impl LoginRecord {
    /// Logout instant, with an active session ending at `now`.
    #[must_use]
    pub fn logout_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self.logout {
            Logout::StillActive => now,
            Logout::At(at) => at,
        }
    }
}

/// Parse a session length of the form `H:MM` or `D+H:MM`.
///
/// Surrounding parentheses are accepted.
pub fn parse_duration(token: &str) -> Result<TimeDelta> {
    let inner = token.trim().trim_start_matches('(').trim_end_matches(')');
    let caps = SESSION_DURATION
        .captures(inner)
        .ok_or_else(|| SessionError::parse_skip(format!("bad session duration {token:?}")))?;

    let number = |i: usize| -> i64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (days, hours, minutes) = (number(1), number(2), number(3));
    if minutes >= 60 {
        return Err(SessionError::parse_skip(format!(
            "minutes out of range in {token:?}"
        )));
    }

    Ok(TimeDelta::days(days) + TimeDelta::hours(hours) + TimeDelta::minutes(minutes))
}

fn is_weekday(token: &str) -> bool {
    token.len() == 3 && token.parse::<Weekday>().is_ok()
}

/// Parse `weekday month day HH:MM` relative to `now`.
fn parse_login_instant(fields: &[&str], now: NaiveDateTime) -> Result<NaiveDateTime> {
    let [weekday, month, day, time] = fields else {
        return Err(SessionError::parse_skip(format!(
            "expected 4 date fields, got {}",
            fields.len()
        )));
    };

    if !is_weekday(weekday) {
        return Err(SessionError::parse_skip(format!("bad weekday {weekday:?}")));
    }

    let year = now.year();
    let login = NaiveDateTime::parse_from_str(
        &format!("{year} {month} {day} {time}"),
        "%Y %b %d %H:%M",
    )
    .map_err(|e| SessionError::parse_skip(format!("bad date {month} {day} {time} in {year}: {e}")))?;

    if login <= now {
        return Ok(login);
    }
    login
        .with_year(year - 1)
        .ok_or_else(|| SessionError::parse_skip(format!("{month} {day} does not exist in {}", year - 1)))
}

/// Parse one line of login history.
///
/// Fails with [`SessionError::ParseSkip`] unless the line is a console
/// session with a complete date and either a duration or `still logged in`.
pub fn parse_line(line: &str, marker: &str, now: NaiveDateTime) -> Result<LoginRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let marker_at = tokens
        .iter()
        .skip(1)
        .position(|t| *t == marker)
        .map(|i| i + 1)
        .ok_or_else(|| SessionError::parse_skip(format!("no {marker:?} terminal")))?;

    let mut fields = &tokens[marker_at + 1..];
    // Remote and X11 sessions carry a source host before the date
    if let Some((first, rest)) = fields.split_first() {
        if !is_weekday(first) {
            fields = rest;
        }
    }
    if fields.len() < 4 {
        return Err(SessionError::parse_skip(format!(
            "only {} fields after terminal",
            fields.len()
        )));
    }
    let login = parse_login_instant(&fields[..4], now)?;

    let rest = fields[4..].join(" ");
    let logout = if rest.contains(STILL_LOGGED_IN) {
        Logout::StillActive
    } else {
        let token = PARENTHESIZED
            .captures(&rest)
            .and_then(|c| c.get(1))
            .ok_or_else(|| SessionError::parse_skip("no session duration"))?;
        Logout::At(login + parse_duration(token.as_str())?)
    };

    Ok(LoginRecord {
        login,
        logout,
        line: line.to_owned(),
    })
}

/// Parse every console session in `text`, skipping lines that don't parse.
pub fn parse_log(text: &str, marker: &str, now: NaiveDateTime) -> Vec<LoginRecord> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line, marker, now) {
            Ok(record) => Some(record),
            Err(e) => {
                trace!(line, category = e.category(), error = %e, "skipping login line");
                None
            }
        })
        .collect()
}
