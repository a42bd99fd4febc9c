//! Worker process launching
//!
//! [`WorkerLauncher`] is the seam between the orchestrator and the operating
//! system. [`LocalLauncher`] starts the model binary as
//! `{executable} -input {module} {config}` in the run directory, optionally
//! under `taskset -c {cpu}` to pin it to one core.

use crate::context::{WorkerSettings, INPUT_MODULE_FLAG};
use crate::error::{RunnerError, RunnerResult};
use crate::job::Job;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Utility used to pin a worker to one CPU
pub const TASKSET: &str = "taskset";

/// How long to wait for a killed worker to be reaped
pub const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts worker processes
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start the worker for `job`, pinned to `cpu` when given
    ///
    /// The returned child must have piped stdout and stderr.
    async fn launch(&self, job: &Job, cpu: Option<usize>) -> RunnerResult<Child>;

    /// Command line that would run `job`
    fn describe(&self, job: &Job) -> String;
}

/// Launches the model binary on this machine
#[derive(Debug)]
pub struct LocalLauncher {
    settings: WorkerSettings,
    taskset: OnceCell<bool>,
}

impl LocalLauncher {
    /// Create launcher
    #[must_use]
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            settings,
            taskset: OnceCell::new(),
        }
    }

    /// Worker settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    fn command(&self, job: &Job, cpu: Option<usize>) -> Command {
        let mut cmd = match cpu {
            Some(cpu) => {
                let mut cmd = Command::new(TASKSET);
                cmd.arg("-c").arg(cpu.to_string()).arg(&self.settings.executable);
                cmd
            }
            None => Command::new(&self.settings.executable),
        };
        cmd.arg(INPUT_MODULE_FLAG)
            .arg(&self.settings.input_module)
            .arg(&job.config)
            .current_dir(&job.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Probe for `taskset` once per launcher
    async fn can_pin(&self) -> bool {
        *self
            .taskset
            .get_or_init(|| async {
                let available = cfg!(target_os = "linux")
                    && Command::new(TASKSET)
                        .arg("--version")
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await
                        .is_ok_and(|status| status.success());
                if !available {
                    warn!("{TASKSET} is not available; workers will run unpinned");
                }
                available
            })
            .await
    }
}

#[async_trait]
impl WorkerLauncher for LocalLauncher {
    async fn launch(&self, job: &Job, cpu: Option<usize>) -> RunnerResult<Child> {
        let cpu = match cpu {
            Some(cpu) if self.can_pin().await => Some(cpu),
            _ => None,
        };
        debug!(job = %job.id, cpu = ?cpu, command = %self.describe(job), "launching worker");
        self.command(job, cpu)
            .spawn()
            .map_err(|source| RunnerError::Launch {
                config: job.config.clone(),
                source,
            })
    }

    fn describe(&self, job: &Job) -> String {
        format!(
            "{} {INPUT_MODULE_FLAG} {} {}",
            self.settings.executable.display(),
            self.settings.input_module,
            job.config.display()
        )
    }
}

/// Whether the child has exited
///
/// Never fails: an error querying the process is logged and reported as
/// still running.
pub fn has_exited(child: &mut Child) -> bool {
    match child.try_wait() {
        Ok(Some(_)) => true,
        Ok(None) => false,
        Err(e) => {
            warn!(error = %e, "failed to query worker status");
            false
        }
    }
}

/// Kill the child and wait for it to be reaped
pub async fn terminate(child: &mut Child) {
    if has_exited(child) {
        return;
    }
    match tokio::time::timeout(KILL_TIMEOUT, child.kill()).await {
        Ok(Ok(())) => debug!(pid = ?child.id(), "worker killed"),
        Ok(Err(e)) => warn!(error = %e, "failed to kill worker"),
        Err(_) => warn!(pid = ?child.id(), "worker did not exit after kill"),
    }
}
