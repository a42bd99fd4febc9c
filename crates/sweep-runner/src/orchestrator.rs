//! Bounded-parallel job execution
//!
//! [`Orchestrator::run`] launches jobs in generation order, never more than
//! `max_concurrency` at once, and waits until every job is terminal:
//! - worker stdout/stderr are read line by line while the worker runs;
//!   non-empty lines go to the [`BatchObserver`]
//! - a failing job does not stop its siblings
//! - cancellation kills running workers and marks unlaunched jobs cancelled
//!
//! The returned [`BatchReport`] turns into a [`ModelException`] when any job
//! failed.

use crate::affinity::{CpuSlot, CpuSlots};
use crate::error::{JobFailure, ModelException, RunnerError, RunnerResult};
use crate::job::{Job, JobId, JobOutcome, JobState};
use crate::launcher::{terminate, WorkerLauncher};
use crate::observer::{BatchObserver, NullObserver, Progress};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stderr lines kept per job for failure reports
pub const STDERR_TAIL_LINES: usize = 20;

/// Buffered output lines per running job
const LINE_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
struct OutputLine {
    stream: Stream,
    text: String,
}

/// Runs jobs with bounded parallelism
pub struct Orchestrator {
    launcher: Arc<dyn WorkerLauncher>,
    observer: Arc<dyn BatchObserver>,
    max_concurrency: usize,
    pin_cpus: bool,
    cancel: CancellationToken,
    states: Arc<DashMap<JobId, JobState>>,
}

impl Orchestrator {
    /// Create orchestrator running at most `max_concurrency` jobs at once
    #[must_use]
    pub fn new(launcher: Arc<dyn WorkerLauncher>, max_concurrency: usize) -> Self {
        Self {
            launcher,
            observer: Arc::new(NullObserver),
            max_concurrency: max_concurrency.max(1),
            pin_cpus: false,
            cancel: CancellationToken::new(),
            states: Arc::new(DashMap::new()),
        }
    }

    /// Report events to `observer`
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Pin each running job to its own CPU
    #[inline]
    #[must_use]
    pub fn with_cpu_pinning(mut self, pin: bool) -> Self {
        self.pin_cpus = pin;
        self
    }

    /// Share an external cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this orchestrator's batch
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the batch
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current state of a job
    #[must_use]
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.states.get(&id).map(|entry| entry.value().clone())
    }

    /// Maximum concurrent jobs
    #[inline]
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run every job to a terminal state
    pub async fn run(&self, jobs: Vec<Job>) -> BatchReport {
        let total = jobs.len();
        info!(jobs = total, max_concurrency = self.max_concurrency, "starting batch");

        self.states.clear();
        for job in &jobs {
            self.states.insert(job.id, JobState::Pending);
        }

        let shared = Arc::new(Shared {
            launcher: Arc::clone(&self.launcher),
            observer: Arc::clone(&self.observer),
            cancel: self.cancel.clone(),
            states: Arc::clone(&self.states),
            cpu_slots: self.pin_cpus.then(|| CpuSlots::new(self.max_concurrency)),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            total,
            started: Instant::now(),
        });

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut outcomes = Vec::with_capacity(total);
        let mut pending = jobs.into_iter();
        let mut launched: HashMap<JobId, Job> = HashMap::new();

        for job in pending.by_ref() {
            let permit = tokio::select! {
                biased;
                () = shared.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                outcomes.push(shared.skip(job));
                break;
            };
            launched.insert(job.id, job.clone());
            let shared = Arc::clone(&shared);
            tasks.spawn(async move {
                let outcome = shared.execute(job).await;
                drop(permit);
                outcome
            });
        }
        for job in pending {
            outcomes.push(shared.skip(job));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    launched.remove(&outcome.job.id);
                    outcomes.push(outcome);
                }
                Err(e) => error!(error = %e, "job task aborted"),
            }
        }
        // Tasks that panicked left no outcome behind
        outcomes.extend(launched.into_values().map(|job| shared.lost(job)));
        outcomes.sort_by_key(|outcome| outcome.job.id);

        let report = BatchReport {
            outcomes,
            peak_concurrency: shared.peak.load(Ordering::SeqCst),
            elapsed: shared.started.elapsed(),
            cancelled: self.cancel.is_cancelled(),
        };
        let summary = report.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "batch finished"
        );
        report
    }
}

/// State shared by the job tasks of one run
struct Shared {
    launcher: Arc<dyn WorkerLauncher>,
    observer: Arc<dyn BatchObserver>,
    cancel: CancellationToken,
    states: Arc<DashMap<JobId, JobState>>,
    cpu_slots: Option<Arc<CpuSlots>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
    total: usize,
    started: Instant,
}

impl Shared {
    fn transition(&self, job: &Job, state: JobState) {
        debug!(job = %job.name, state = %state, "job state");
        self.states.insert(job.id, state.clone());
        self.observer.on_state(job, &state);
    }

    /// Cancel a job that was never launched
    fn skip(&self, job: Job) -> JobOutcome {
        self.finish(job, JobState::Cancelled, Duration::ZERO, Vec::new())
    }

    /// Fail a job whose task ended without an outcome
    ///
    /// The observer is not told: it may be what panicked.
    fn lost(&self, job: Job) -> JobOutcome {
        let state = JobState::Failed("job task ended without reporting an outcome".to_string());
        error!(job = %job.name, "simulation task lost");
        self.states.insert(job.id, state.clone());
        self.finished.fetch_add(1, Ordering::SeqCst);
        JobOutcome {
            job,
            state,
            duration: Duration::ZERO,
            stderr_tail: Vec::new(),
        }
    }

    fn finish(&self, job: Job, state: JobState, duration: Duration, stderr_tail: Vec<String>) -> JobOutcome {
        match &state {
            JobState::Completed(0) => {
                debug!(job = %job.name, elapsed = ?duration, "simulation complete");
            }
            JobState::Completed(code) => {
                warn!(job = %job.name, exit_code = code, "simulation exited with non-zero code");
            }
            JobState::Failed(reason) => warn!(job = %job.name, %reason, "simulation failed"),
            _ => {}
        }
        self.transition(&job, state.clone());

        let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        self.observer.on_progress(&Progress {
            finished,
            total: self.total,
            elapsed: self.started.elapsed(),
        });

        JobOutcome {
            job,
            state,
            duration,
            stderr_tail,
        }
    }

    async fn execute(&self, job: Job) -> JobOutcome {
        if self.cancel.is_cancelled() {
            return self.skip(job);
        }

        let slot = self.cpu_slots.as_ref().and_then(CpuSlots::acquire);
        let started = Instant::now();
        self.transition(&job, JobState::Running);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let (state, stderr_tail) = self.supervise(&job, slot.as_ref().map(CpuSlot::cpu)).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        drop(slot);
        self.finish(job, state, started.elapsed(), stderr_tail)
    }

    /// Launch the worker and follow it until exit or cancellation
    async fn supervise(&self, job: &Job, cpu: Option<usize>) -> (JobState, Vec<String>) {
        let mut child = match self.launcher.launch(job, cpu).await {
            Ok(child) => child,
            Err(e) => return (JobState::Failed(e.to_string()), Vec::new()),
        };

        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut streams_open = true;
        let status = loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    terminate(&mut child).await;
                    info!(job = %job.name, "simulation cancelled");
                    return (JobState::Cancelled, tail.into());
                }
                line = rx.recv(), if streams_open => match line {
                    Some(line) => self.forward(job, line, &mut tail),
                    None => streams_open = false,
                },
                status = child.wait() => break status,
            }
        };

        // Output still buffered after exit; a grandchild holding the pipe
        // open must not keep the job alive past cancellation.
        while streams_open {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                line = rx.recv() => match line {
                    Some(line) => self.forward(job, line, &mut tail),
                    None => streams_open = false,
                },
            }
        }

        let state = match status {
            Ok(status) => match status.code() {
                Some(code) => JobState::Completed(code),
                None => JobState::Failed(format!("worker terminated by signal ({status})")),
            },
            Err(e) => JobState::Failed(format!("failed to wait for worker: {e}")),
        };
        (state, tail.into())
    }

    fn forward(&self, job: &Job, line: OutputLine, tail: &mut VecDeque<String>) {
        match line.stream {
            Stream::Stdout => self.observer.on_stdout(job, &line.text),
            Stream::Stderr => {
                self.observer.on_stderr(job, &line.text);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.text);
            }
        }
    }
}

/// Forward non-empty lines until the stream closes
async fn read_lines<R>(reader: R, stream: Stream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let text = text.trim_end_matches(['\r', '\n']);
                if text.trim().is_empty() {
                    continue;
                }
                let line = OutputLine {
                    stream,
                    text: text.to_string(),
                };
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, ?stream, "worker output closed");
                break;
            }
        }
    }
}

/// Counts of a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub not_run: usize,
    pub peak_concurrency: usize,
    pub elapsed_secs: u64,
}

/// Outcome of every job in a batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per job, in generation order
    pub outcomes: Vec<JobOutcome>,
    /// Most jobs observed running at once
    pub peak_concurrency: usize,
    pub elapsed: Duration,
    /// Whether the batch was cancelled
    pub cancelled: bool,
}

impl BatchReport {
    /// Report for jobs that were generated but not run
    #[must_use]
    pub fn not_run(jobs: Vec<Job>) -> Self {
        Self {
            outcomes: jobs
                .into_iter()
                .map(|job| JobOutcome {
                    job,
                    state: JobState::Pending,
                    duration: Duration::ZERO,
                    stderr_tail: Vec::new(),
                })
                .collect(),
            peak_concurrency: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        }
    }

    /// Outcome of one job
    #[must_use]
    pub fn outcome(&self, id: JobId) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|outcome| outcome.job.id == id)
    }

    /// Failed jobs, in generation order
    #[must_use]
    pub fn failures(&self) -> Vec<JobFailure> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state.is_failure())
            .map(|outcome| JobFailure {
                job: outcome.job.id,
                name: outcome.job.name.clone(),
                config: outcome.job.config.clone(),
                exit_code: match outcome.state {
                    JobState::Completed(code) => Some(code),
                    _ => None,
                },
                reason: match &outcome.state {
                    JobState::Failed(reason) => Some(reason.clone()),
                    _ => None,
                },
                stderr: outcome.stderr_tail.clone(),
            })
            .collect()
    }

    /// Counts by outcome
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let count = |f: fn(&JobState) -> bool| self.outcomes.iter().filter(|o| f(&o.state)).count();
        BatchSummary {
            total: self.outcomes.len(),
            succeeded: count(JobState::is_success),
            failed: count(JobState::is_failure),
            cancelled: count(|state| matches!(state, JobState::Cancelled)),
            not_run: count(|state| matches!(state, JobState::Pending)),
            peak_concurrency: self.peak_concurrency,
            elapsed_secs: self.elapsed.as_secs(),
        }
    }

    /// `Ok(self)` unless the batch was cancelled or any job failed
    ///
    /// # Errors
    /// - [`RunnerError::Cancelled`] if the batch was cancelled
    /// - [`RunnerError::Model`] listing every failed job otherwise
    pub fn into_result(self) -> RunnerResult<Self> {
        if self.cancelled {
            return Err(RunnerError::Cancelled);
        }
        let failures = self.failures();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(ModelException {
                failures,
                total: self.outcomes.len(),
            }
            .into())
        }
    }
}
