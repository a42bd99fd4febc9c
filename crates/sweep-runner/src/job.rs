//! Jobs and their lifecycle
//!
//! Every job moves `Pending -> Running -> {Completed, Failed, Cancelled}`,
//! except that a job cancelled before launch goes straight from `Pending` to
//! `Cancelled`. Terminal states are final.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Position of a job in its batch, in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub usize);

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// One worker invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Display name, `{base_stem}/{simulation}`
    pub name: String,
    /// Generated config handed to the worker
    pub config: PathBuf,
    /// Directory the worker runs in; its outputs land here
    pub working_dir: PathBuf,
}

impl Job {
    /// Job running in the directory that holds its config
    #[must_use]
    pub fn new(id: JobId, name: impl Into<String>, config: impl Into<PathBuf>) -> Self {
        let config = config.into();
        let working_dir = config
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            id,
            name: name.into(),
            config,
            working_dir,
        }
    }

    /// Run in a different directory
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    /// Worker exited with this code
    Completed(i32),
    /// Worker could not be launched or did not produce an exit code
    Failed(String),
    Cancelled,
}

impl JobState {
    /// Whether no further transition can happen
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }

    /// Completed with exit code 0
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(0))
    }

    /// Terminal and not successful, excluding cancellation
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Completed(code) if *code != 0) || matches!(self, Self::Failed(_))
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Completed(code) => write!(f, "completed (exit code {code})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Final state of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: Job,
    pub state: JobState,
    /// Time from launch to exit; zero if never launched
    pub duration: Duration,
    /// Last lines the worker wrote to stderr
    pub stderr_tail: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_dir_defaults_to_config_parent() {
        let job = Job::new(JobId(0), "base/a-1", "/out/base/a-1/a-1.cfg");
        assert_eq!(job.working_dir, Path::new("/out/base/a-1"));

        let job = job.with_working_dir("/tmp");
        assert_eq!(job.working_dir, Path::new("/tmp"));
    }

    #[test]
    fn state_classification() {
        assert!(JobState::Completed(0).is_success());
        assert!(JobState::Completed(2).is_failure());
        assert!(JobState::Failed("boom".to_string()).is_failure());
        assert!(!JobState::Cancelled.is_failure());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Pending.is_terminal());
    }
}
