//! Rate-limited background recomputation of login times.
//!
//! Running `last` and parsing its output is far too slow for every sampling
//! tick. [`SessionTracker`] runs it on a spawned task, at most one at a time,
//! and not again until the cooldown since the last completed run has passed.

use crate::aggregate::{compute_login_times_with_marker, LoginTimes};
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use hostpulse_core::GlobalConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where the raw login history comes from.
#[async_trait]
pub trait LoginHistorySource: Send + Sync {
    /// Full text of the login history.
    async fn fetch(&self) -> Result<String>;
}

/// Runs an external command (by default `last`) and captures its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCommand {
    program: String,
    args: Vec<String>,
}

impl LastCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split the configured command line on whitespace.
    pub fn from_config(config: &GlobalConfig) -> Self {
        let mut parts = config.last_command.split_whitespace();
        match parts.next() {
            Some(program) => Self::new(program).with_args(parts),
            None => Self::default(),
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for LastCommand {
    fn default() -> Self {
        Self::new("last")
    }
}

#[async_trait]
impl LoginHistorySource for LastCommand {
    async fn fetch(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SessionError::command_failed(self.command_line(), e))?;

        if !output.status.success() {
            return Err(SessionError::command_failed(self.command_line(), output.status));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| SessionError::command_failed(self.command_line(), e))
    }
}

/// Fetch the history and total it, falling back to `N/A` if the fetch fails.
pub async fn load_login_times(
    source: &dyn LoginHistorySource,
    marker: &str,
    now: NaiveDateTime,
) -> LoginTimes {
    match source.fetch().await {
        Ok(text) => compute_login_times_with_marker(&text, marker, now),
        Err(e) => {
            warn!(category = e.category(), error = %e, "login history unavailable");
            LoginTimes::unavailable()
        }
    }
}

/// Owns the last result and the background computation that replaces it.
pub struct SessionTracker {
    source: Arc<dyn LoginHistorySource>,
    marker: String,
    cooldown: Duration,
    pending: Option<JoinHandle<LoginTimes>>,
    last_completed: Option<Instant>,
    latest: LoginTimes,
}

impl SessionTracker {
    pub fn new(source: Arc<dyn LoginHistorySource>, marker: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            source,
            marker: marker.into(),
            cooldown,
            pending: None,
            last_completed: None,
            latest: LoginTimes::unavailable(),
        }
    }

    /// Tracker running the configured command with the configured cooldown.
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            Arc::new(LastCommand::from_config(config)),
            config.console_marker.clone(),
            config.session_cooldown(),
        )
    }

    /// Whether a computation has been started and not yet collected.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the running computation has finished and can be collected
    /// without waiting.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending.as_ref().is_some_and(JoinHandle::is_finished)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether [`trigger_at`](Self::trigger_at) would start a computation.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending.is_none()
            && self
                .last_completed
                .map_or(true, |done| now.saturating_duration_since(done) >= self.cooldown)
    }

    /// Start a background computation unless one is running or the cooldown
    /// has not elapsed. Returns whether one was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger_at(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            debug!(in_flight = self.is_in_flight(), "login time refresh suppressed");
            return false;
        }

        let source = Arc::clone(&self.source);
        let marker = self.marker.clone();
        self.pending = Some(tokio::spawn(async move {
            let now = Local::now().naive_local();
            load_login_times(source.as_ref(), &marker, now).await
        }));
        true
    }

    pub fn trigger(&mut self) -> bool {
        self.trigger_at(Instant::now())
    }

    async fn collect(&mut self, handle: JoinHandle<LoginTimes>, now: Instant) {
        let result = handle.await.unwrap_or_else(|e| {
            warn!(error = %e, "login time task failed");
            LoginTimes::unavailable()
        });
        self.latest = result;
        self.last_completed = Some(now);
    }

    /// Collect a finished computation without waiting, then start a new one
    /// if it is due. Returns the latest result.
    pub async fn poll_at(&mut self, now: Instant) -> LoginTimes {
        if let Some(handle) = self.pending.take_if(|h| h.is_finished()) {
            self.collect(handle, now).await;
        }
        self.trigger_at(now);
        self.latest
    }

    pub async fn poll(&mut self) -> LoginTimes {
        self.poll_at(Instant::now()).await
    }

    /// Wait for the running computation, if any, and record its result.
    pub async fn finish(&mut self) -> LoginTimes {
        if let Some(handle) = self.pending.take() {
            self.collect(handle, Instant::now()).await;
        }
        self.latest
    }

    /// Most recent result, `N/A` until the first computation completes.
    #[must_use]
    pub fn latest(&self) -> LoginTimes {
        self.latest
    }

    /// Trigger and wait in one step.
    ///
    /// Returns the previous result untouched if the trigger is suppressed.
    pub async fn refresh(&mut self) -> LoginTimes {
        if !self.trigger() {
            return self.latest;
        }
        self.finish().await
    }
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker")
            .field("marker", &self.marker)
            .field("cooldown", &self.cooldown)
            .field("in_flight", &self.is_in_flight())
            .field("last_completed", &self.last_completed)
            .field("latest", &self.latest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        text: Option<&'static str>,
        fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new(text: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                text,
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoginHistorySource for CountingSource {
        async fn fetch(&self) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.text
                .map(str::to_owned)
                .ok_or_else(|| SessionError::command_failed("last", "exit status: 1"))
        }
    }

    fn tracker(source: &Arc<CountingSource>) -> SessionTracker {
        SessionTracker::new(source.clone(), "console", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_latest_starts_unavailable() {
        let source = CountingSource::new(Some(""));
        let tracker = tracker(&source);
        assert_eq!(tracker.latest(), LoginTimes::unavailable());
        assert_eq!(tracker.latest().today_text(), "N/A");
        assert!(!tracker.is_in_flight());
    }

    async fn wait_until_ready(tracker: &SessionTracker) {
        for _ in 0..1000 {
            if tracker.is_ready() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("login time computation never finished");
    }

    #[tokio::test]
    async fn test_trigger_within_cooldown_is_noop() {
        let source = CountingSource::new(Some(""));
        let mut tracker = tracker(&source);
        let t0 = Instant::now();

        assert!(tracker.trigger_at(t0));
        // Still in flight
        assert!(!tracker.trigger_at(t0 + Duration::from_secs(90)));

        wait_until_ready(&tracker).await;
        let result = tracker.poll_at(t0 + Duration::from_secs(1)).await;
        assert!(!tracker.is_in_flight());
        assert_eq!(result, LoginTimes::new(Duration::ZERO, Duration::ZERO));

        // Cooldown counts from completion, not from the trigger
        assert!(!tracker.trigger_at(t0 + Duration::from_secs(60)));
        assert_eq!(source.fetches(), 1);

        assert!(tracker.trigger_at(t0 + Duration::from_secs(61)));
        tracker.finish().await;
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_poll_does_not_wait_for_running_computation() {
        let source = CountingSource::new(Some(""));
        let mut tracker = tracker(&source);
        let t0 = Instant::now();

        // Starts the computation and returns the sentinel right away
        assert_eq!(tracker.poll_at(t0).await, LoginTimes::unavailable());
        assert!(tracker.is_in_flight());

        wait_until_ready(&tracker).await;
        assert!(tracker.poll_at(t0 + Duration::from_secs(1)).await.is_available());
        assert!(!tracker.is_in_flight());
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_finish_without_computation_keeps_latest() {
        let source = CountingSource::new(Some(""));
        let mut tracker = tracker(&source);
        assert_eq!(tracker.finish().await, LoginTimes::unavailable());
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_refresh_twice_computes_once() {
        let source = CountingSource::new(Some(""));
        let mut tracker = tracker(&source);

        let first = tracker.refresh().await;
        assert!(first.is_available());
        let second = tracker.refresh().await;
        assert_eq!(first, second);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_gives_sentinel_pair() {
        let source = CountingSource::new(None);
        let mut tracker = tracker(&source);

        let times = tracker.refresh().await;
        assert_eq!(times, LoginTimes::unavailable());
        assert_eq!(times.week_text(), "N/A");
        assert!(!tracker.is_in_flight());
    }

    #[tokio::test]
    async fn test_zero_cooldown_always_due() {
        let source = CountingSource::new(Some(""));
        let mut tracker = SessionTracker::new(source.clone(), "console", Duration::ZERO);

        tracker.refresh().await;
        tracker.refresh().await;
        assert_eq!(source.fetches(), 2);
    }

    #[test]
    fn test_last_command_from_config() {
        let mut config = GlobalConfig::default();
        assert_eq!(LastCommand::from_config(&config), LastCommand::new("last"));

        config.last_command = "last -F console".to_owned();
        assert_eq!(
            LastCommand::from_config(&config),
            LastCommand::new("last").with_args(["-F", "console"])
        );

        config.last_command = "   ".to_owned();
        assert_eq!(LastCommand::from_config(&config), LastCommand::default());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_last_command_captures_stdout() {
        let command = LastCommand::new("sh").with_args(["-c", "echo alice console"]);
        assert_eq!(command.fetch().await.unwrap(), "alice console\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_last_command_failures() {
        let missing = LastCommand::new("hostpulse-no-such-command");
        assert!(matches!(
            missing.fetch().await,
            Err(SessionError::ExternalCommandFailure { .. })
        ));

        let failing = LastCommand::new("sh").with_args(["-c", "exit 3"]);
        assert!(matches!(
            failing.fetch().await,
            Err(SessionError::ExternalCommandFailure { .. })
        ));

        let binary = LastCommand::new("sh").with_args(["-c", "printf '\\377\\376'"]);
        assert_eq!(binary.fetch().await.unwrap_err().category(), "command");
    }
}
