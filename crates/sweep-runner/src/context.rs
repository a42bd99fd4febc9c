//! Batch-wide settings
//!
//! A [`BatchContext`] is built once per invocation (from an experiment file,
//! CLI overrides applied) and passed to the generator and orchestrator.

use crate::error::{RunnerError, RunnerResult};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use sweep_catalog::{NamingStrategy, PathResolver};
use ulid::Ulid;

/// Default worker executable
pub const DEFAULT_WORKER: &str = if cfg!(windows) { "guesscmd.exe" } else { "guess" };

/// Flag preceding the input module in the worker command line
pub const INPUT_MODULE_FLAG: &str = "-input";

/// Identifier for one batch invocation, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Fresh identifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// How to invoke the model binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    pub executable: PathBuf,
    pub input_module: String,
}

impl WorkerSettings {
    /// Settings for the default executable
    #[must_use]
    pub fn new(input_module: impl Into<String>) -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_WORKER),
            input_module: input_module.into(),
        }
    }

    /// Use a different executable
    #[inline]
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }
}

/// `path` joined onto the current directory unless already absolute
///
/// Workers run inside their run directory, so every path handed to them
/// must survive the change of directory.
///
/// # Errors
/// Returns the error of [`std::env::current_dir`]
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Available hardware parallelism, at least 1
#[must_use]
pub fn available_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Settings shared by every job of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    pub batch_id: BatchId,
    pub output_root: PathBuf,
    pub max_concurrency: usize,
    pub naming: NamingStrategy,
    pub pin_cpus: bool,
    pub dry_run: bool,
    pub worker: WorkerSettings,
}

impl BatchContext {
    /// Context with one job per available CPU and verbatim run names
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>, worker: WorkerSettings) -> Self {
        Self {
            batch_id: BatchId::new(),
            output_root: output_root.into(),
            max_concurrency: available_cpus(),
            naming: NamingStrategy::Manual,
            pin_cpus: false,
            dry_run: false,
            worker,
        }
    }

    /// Run at most `max` jobs at once
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Name run directories with `naming`
    #[inline]
    #[must_use]
    pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    /// Pin each running job to its own CPU
    #[inline]
    #[must_use]
    pub fn with_cpu_pinning(mut self, pin: bool) -> Self {
        self.pin_cpus = pin;
        self
    }

    /// Generate and log commands without launching workers
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check the settings before anything is written
    ///
    /// # Errors
    /// Returns [`RunnerError::Argument`] if concurrency is zero or exceeds
    /// the available CPUs, or the input module is empty
    pub fn validate(&self) -> RunnerResult<()> {
        let cpus = available_cpus();
        if self.max_concurrency == 0 || self.max_concurrency > cpus {
            return Err(RunnerError::argument(format!(
                "cpu count must be between 1 and {cpus}, got {}",
                self.max_concurrency
            )));
        }
        if self.worker.input_module.trim().is_empty() {
            return Err(RunnerError::argument("input module must not be empty"));
        }
        Ok(())
    }

    /// Path resolver for this batch's output root
    #[must_use]
    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.output_root.clone(), self.naming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let ctx = BatchContext::new("/out", WorkerSettings::new("nc"));
        assert_eq!(ctx.max_concurrency, available_cpus());
        assert_eq!(ctx.naming, NamingStrategy::Manual);
        assert_eq!(ctx.worker.executable, PathBuf::from(DEFAULT_WORKER));
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_concurrency() {
        let ctx = BatchContext::new("/out", WorkerSettings::new("nc"));
        assert!(ctx.clone().with_max_concurrency(0).validate().is_err());
        assert!(ctx.with_max_concurrency(available_cpus() + 1).validate().is_err());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_path(Path::new("out/run")).unwrap(), cwd.join("out/run"));
        assert_eq!(absolute_path(&cwd).unwrap(), cwd);
    }

    #[test]
    fn rejects_empty_module() {
        let ctx = BatchContext::new("/out", WorkerSettings::new(" "));
        assert!(matches!(ctx.validate(), Err(RunnerError::Argument(_))));
    }
}
