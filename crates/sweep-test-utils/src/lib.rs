//! Testing utilities for the sweep workspace
//!
//! Shared fixtures, a shell-script worker launcher and an event-recording
//! observer.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use sweep_runner::{BatchObserver, Job, JobId, JobState, Progress, RunnerError, RunnerResult, WorkerLauncher};
use tokio::process::{Child, Command};

/// Small instruction file with two sub-components and an import
pub const SAMPLE_CONFIG: &str = r#"! Sample instruction file
title "sample run"
npatch 5        ! patches per stand
nyear_spinup 500
wateruptake "rootdist"

group "common" (
    lambda_max 0.8
)

pft "TeBE" (
    common
    include 1
    sla 10
)

pft "C3G" (
    common
    include 1
    sla 32.4
)

st "Natural" (
    stinclude 1
)
"#;

/// Write [`SAMPLE_CONFIG`] as `{dir}/{name}`
pub fn write_sample_config(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, SAMPLE_CONFIG).unwrap();
    path
}

/// One job per script, each in its own directory under `dir`
pub fn script_jobs(dir: &Path, scripts: &[&str]) -> Vec<Job> {
    scripts
        .iter()
        .enumerate()
        .map(|(i, script)| {
            let run_dir = dir.join(format!("job-{i}"));
            std::fs::create_dir_all(&run_dir).unwrap();
            let config = run_dir.join("run.sh");
            std::fs::write(&config, script).unwrap();
            Job::new(JobId(i), format!("job-{i}"), config)
        })
        .collect()
}

/// Runs jobs through `sh` instead of the model binary
///
/// By default the job's config file is executed as a script. With
/// [`ScriptLauncher::inline`] a fixed script runs instead, receiving the
/// config path as `$1`.
#[derive(Debug, Clone, Default)]
pub struct ScriptLauncher {
    script: Option<String>,
    launched: std::sync::Arc<Mutex<Vec<(JobId, Option<usize>)>>>,
}

impl ScriptLauncher {
    /// Execute each job's config as a shell script
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `script` for every job
    pub fn inline(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            ..Self::default()
        }
    }

    /// Jobs launched so far, with the CPU each was pinned to
    pub fn launched(&self) -> Vec<(JobId, Option<usize>)> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl WorkerLauncher for ScriptLauncher {
    async fn launch(&self, job: &Job, cpu: Option<usize>) -> RunnerResult<Child> {
        self.launched.lock().push((job.id, cpu));
        let mut cmd = Command::new("sh");
        match &self.script {
            Some(script) => cmd.arg("-c").arg(script).arg("sh").arg(&job.config),
            None => cmd.arg(&job.config),
        };
        cmd.current_dir(&job.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Launch {
                config: job.config.clone(),
                source,
            })
    }

    fn describe(&self, job: &Job) -> String {
        format!("sh {}", job.config.display())
    }
}

/// Everything an observer can see
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Stdout(JobId, String),
    Stderr(JobId, String),
    State(JobId, JobState),
    Progress(Progress),
}

/// Records every event for later assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Stdout lines of one job
    pub fn stdout(&self, id: JobId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Stdout(job, line) if *job == id => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// States one job went through
    pub fn states(&self, id: JobId) -> Vec<JobState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::State(job, state) if *job == id => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    /// Jobs in the order they started running
    pub fn started(&self) -> Vec<JobId> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::State(job, JobState::Running) => Some(*job),
                _ => None,
            })
            .collect()
    }

    /// Most jobs running at once, replayed from the state events
    pub fn max_running(&self) -> usize {
        let mut running = HashSet::new();
        let mut max = 0;
        for event in self.events.lock().iter() {
            match event {
                Event::State(job, JobState::Running) => {
                    running.insert(*job);
                    max = max.max(running.len());
                }
                Event::State(job, state) if state.is_terminal() => {
                    running.remove(job);
                }
                _ => {}
            }
        }
        max
    }

    /// Progress reports, in order
    pub fn progress(&self) -> Vec<Progress> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl BatchObserver for RecordingObserver {
    fn on_stdout(&self, job: &Job, line: &str) {
        self.events.lock().push(Event::Stdout(job.id, line.to_string()));
    }

    fn on_stderr(&self, job: &Job, line: &str) {
        self.events.lock().push(Event::Stderr(job.id, line.to_string()));
    }

    fn on_state(&self, job: &Job, state: &JobState) {
        self.events.lock().push(Event::State(job.id, state.clone()));
    }

    fn on_progress(&self, progress: &Progress) {
        self.events.lock().push(Event::Progress(*progress));
    }
}
