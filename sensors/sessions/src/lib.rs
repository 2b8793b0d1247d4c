//! Console session time from the login history.
//!
//! [`compute_login_times`] turns `last` output into today and this-week
//! totals; [`SessionTracker`] reruns it in the background at most once per
//! cooldown.

pub mod aggregate;
pub mod error;
pub mod parse;
pub mod tracker;

pub use aggregate::{
    aggregate_records, compute_login_times, compute_login_times_with_marker, LoginTimes, TimeWindow,
};
pub use error::SessionError;
pub use parse::{parse_duration, parse_line, parse_log, LoginRecord, Logout, DEFAULT_CONSOLE_MARKER};
pub use tracker::{load_login_times, LastCommand, LoginHistorySource, SessionTracker};
