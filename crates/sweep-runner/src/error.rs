//! Error types for experiment execution
//!
//! Provides error handling for:
//! - Experiment definitions that cannot be used
//! - Generation failures from the lower layers
//! - Worker launch failures
//! - Batch-level failure ([`ModelException`]) and cancellation

use crate::job::JobId;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use sweep_catalog::CatalogError;
use sweep_document::DocumentError;
use sweep_factorial::FactorialError;

/// Main runner error type
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Invalid setting or combination of settings
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Experiment definition could not be read or understood
    #[error("invalid experiment file {}: {message}", path.display())]
    Experiment { path: PathBuf, message: String },

    /// Config document error
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Factor expansion or config generation error
    #[error(transparent)]
    Factorial(#[from] FactorialError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Worker process could not be started
    #[error("failed to launch worker for {}: {source}", config.display())]
    Launch {
        config: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more jobs failed
    #[error(transparent)]
    Model(#[from] ModelException),

    /// Batch was cancelled before every job finished
    #[error("batch cancelled")]
    Cancelled,
}

impl RunnerError {
    /// Create argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create experiment-definition error
    pub fn experiment(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Experiment {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A job that did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job: JobId,
    pub name: String,
    pub config: PathBuf,
    /// Worker exit code, if it exited normally
    pub exit_code: Option<i32>,
    /// Launch or wait failure, if the worker never produced an exit code
    pub reason: Option<String>,
    /// Last lines the worker wrote to stderr
    pub stderr: Vec<String>,
}

impl Display for JobFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.config.display())?;
        match (&self.exit_code, &self.reason) {
            (Some(code), _) => write!(f, ": exit code {code}")?,
            (None, Some(reason)) => write!(f, ": {reason}")?,
            (None, None) => {}
        }
        if let Some(last) = self.stderr.last() {
            write!(f, ": {last}")?;
        }
        Ok(())
    }
}

/// Batch failure raised once every job has reached a terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelException {
    pub failures: Vec<JobFailure>,
    pub total: usize,
}

impl Display for ModelException {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} simulations failed", self.failures.len(), self.total)?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ModelException {}

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_exception_lists_failures() {
        let err = ModelException {
            failures: vec![
                JobFailure {
                    job: JobId(2),
                    name: "base/a-1".to_string(),
                    config: PathBuf::from("/out/base/a-1/a-1.cfg"),
                    exit_code: Some(3),
                    reason: None,
                    stderr: vec!["warming up".to_string(), "bad gridlist".to_string()],
                },
                JobFailure {
                    job: JobId(4),
                    name: "base/a-2".to_string(),
                    config: PathBuf::from("/out/base/a-2/a-2.cfg"),
                    exit_code: None,
                    reason: Some("not found".to_string()),
                    stderr: Vec::new(),
                },
            ],
            total: 5,
        };
        assert_eq!(
            err.to_string(),
            "2 of 5 simulations failed\n  base/a-1 (/out/base/a-1/a-1.cfg): exit code 3: bad gridlist\n  base/a-2 (/out/base/a-2/a-2.cfg): not found"
        );
    }
}
