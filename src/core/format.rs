//! Date formatting and debounce helpers shared by the editor

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default pattern used for the "last saved" display
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD HH:mm:ss";

/// Render a timestamp using `YYYY`, `MM`, `DD`, `HH`, `mm` and `ss` tokens.
///
/// Each token is substituted once, at its first occurrence, in that order.
/// A pattern that repeats a token keeps the later copies verbatim.
pub fn format_date_time<Tz: TimeZone>(date: &DateTime<Tz>, format: &str) -> String {
    format
        .replacen("YYYY", &date.year().to_string(), 1)
        .replacen("MM", &format!("{:02}", date.month()), 1)
        .replacen("DD", &format!("{:02}", date.day()), 1)
        .replacen("HH", &format!("{:02}", date.hour()), 1)
        .replacen("mm", &format!("{:02}", date.minute()), 1)
        .replacen("ss", &format!("{:02}", date.second()), 1)
}

/// Runs a task once calls have stopped arriving for `delay`.
///
/// Each call cancels the previous one if it is still waiting. Once the quiet
/// period has elapsed the task is detached, so a later call never interrupts
/// it mid-flight.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    runtime: Option<Handle>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            runtime: None,
            pending: None,
        }
    }

    /// Create a debouncer that always schedules on `runtime`, so it can be
    /// called from threads outside it
    pub fn on_runtime(delay: Duration, runtime: Handle) -> Self {
        Self {
            delay,
            runtime: Some(runtime),
            pending: None,
        }
    }

    /// Quiet period before the task runs
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task`, replacing any call still waiting. Returns false,
    /// and drops the task, when no tokio runtime is available.
    pub fn call<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            tracing::warn!("No async runtime available, dropping debounced task");
            return false;
        };
        let delay = self.delay;
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        }));
        true
    }

    /// Drop the waiting call, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a call is still inside its quiet period
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
