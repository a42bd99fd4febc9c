//! Batch event sinks
//!
//! The orchestrator reports worker output, state transitions and progress to
//! a [`BatchObserver`]. Callbacks run on the job tasks, so implementations
//! must be cheap and must not block.

use crate::job::{Job, JobState};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default minimum gap between console progress reports
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Completed-job fraction of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub finished: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    /// Percentage of jobs in a terminal state
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.finished as f64 / self.total as f64 * 100.0
    }

    /// Linear estimate of the time left
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        if self.finished == 0 {
            return None;
        }
        let left = u32::try_from(self.total.saturating_sub(self.finished)).ok()?;
        let done = u32::try_from(self.finished).ok()?;
        Some(self.elapsed / done * left)
    }

    /// Whether every job has finished
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.finished >= self.total
    }
}

/// Receives batch events
pub trait BatchObserver: Send + Sync {
    /// Non-empty line the worker wrote to stdout
    fn on_stdout(&self, _job: &Job, _line: &str) {}

    /// Non-empty line the worker wrote to stderr
    fn on_stderr(&self, _job: &Job, _line: &str) {}

    /// Job entered `state`
    fn on_state(&self, _job: &Job, _state: &JobState) {}

    /// A job reached a terminal state
    fn on_progress(&self, _progress: &Progress) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl BatchObserver for NullObserver {}

/// Logs worker output and throttled progress through `tracing`
#[derive(Debug)]
pub struct ConsoleObserver {
    interval: Duration,
    last_report: Mutex<Option<Instant>>,
}

impl ConsoleObserver {
    /// Observer reporting progress at most once per [`PROGRESS_INTERVAL`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(PROGRESS_INTERVAL)
    }

    /// Observer with a custom report interval
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Mutex::new(None),
        }
    }

    /// Whether a report is due now; the final report always is
    fn should_report(&self, progress: &Progress) -> bool {
        let now = Instant::now();
        let mut last = self.last_report.lock();
        let due = progress.is_complete()
            || last.map_or(true, |at| now.duration_since(at) >= self.interval);
        if due {
            *last = Some(now);
        }
        due
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchObserver for ConsoleObserver {
    fn on_stdout(&self, job: &Job, line: &str) {
        info!(job = %job.name, "{line}");
    }

    fn on_stderr(&self, job: &Job, line: &str) {
        warn!(job = %job.name, "{line}");
    }

    fn on_progress(&self, progress: &Progress) {
        if !self.should_report(progress) {
            return;
        }
        info!("{}", format_progress(progress));
    }
}

/// `12.5% complete, elapsed 10s, remaining 70s (1/8 simulations complete)`
#[must_use]
pub fn format_progress(progress: &Progress) -> String {
    let remaining = progress
        .remaining()
        .map_or_else(|| "unknown".to_string(), format_duration);
    format!(
        "{:.1}% complete, elapsed {}, remaining {} ({}/{} simulations complete)",
        progress.percent(),
        format_duration(progress.elapsed),
        remaining,
        progress.finished,
        progress.total
    )
}

/// Whole seconds, as `1h02m03s`, `4m05s` or `6s`
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
