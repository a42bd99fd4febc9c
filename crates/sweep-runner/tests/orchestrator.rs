//! Orchestrator behaviour against real `sh` workers

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use sweep_runner::prelude::*;
use sweep_runner::{LocalLauncher, WorkerSettings};
use sweep_test_utils::{script_jobs, RecordingObserver, ScriptLauncher};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(30);

fn orchestrator(max: usize, observer: Arc<RecordingObserver>) -> Orchestrator {
    Orchestrator::new(Arc::new(ScriptLauncher::new()), max).with_observer(observer)
}

#[tokio::test]
async fn never_exceeds_max_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["exec sleep 0.3"; 5]);
    let observer = Arc::new(RecordingObserver::new());

    let report = tokio::time::timeout(TIMEOUT, orchestrator(2, observer.clone()).run(jobs))
        .await
        .unwrap();

    assert_eq!(report.peak_concurrency, 2);
    assert!(observer.max_running() <= 2);
    assert_eq!(report.summary().succeeded, 5);
    assert!(report.outcomes.iter().all(|o| o.state == JobState::Completed(0)));
}

#[tokio::test]
async fn progress_is_reported_after_every_job() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["exit 0"; 4]);
    let observer = Arc::new(RecordingObserver::new());

    tokio::time::timeout(TIMEOUT, orchestrator(2, observer.clone()).run(jobs))
        .await
        .unwrap();

    let progress = observer.progress();
    assert_eq!(progress.len(), 4);
    assert_eq!(
        progress.iter().map(|p| p.finished).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(progress.iter().all(|p| p.total == 4));
}

/// Cancels the batch as soon as a given job starts
struct CancelOnStart {
    job: JobId,
    token: CancellationToken,
    inner: Arc<RecordingObserver>,
}

impl BatchObserver for CancelOnStart {
    fn on_state(&self, job: &Job, state: &JobState) {
        self.inner.on_state(job, state);
        if job.id == self.job && *state == JobState::Running {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_kills_running_and_skips_pending() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(
        dir.path(),
        &["exit 0", "exit 0", "exec sleep 30", "exit 0", "exit 0"],
    );
    let token = CancellationToken::new();
    let recorder = Arc::new(RecordingObserver::new());
    let observer = Arc::new(CancelOnStart {
        job: JobId(2),
        token: token.clone(),
        inner: recorder.clone(),
    });
    let orchestrator = Orchestrator::new(Arc::new(ScriptLauncher::new()), 1)
        .with_observer(observer)
        .with_cancellation(token);

    let report = tokio::time::timeout(TIMEOUT, orchestrator.run(jobs))
        .await
        .expect("cancelled batch must not wait for the sleeping worker");

    let states: Vec<JobState> = report.outcomes.iter().map(|o| o.state.clone()).collect();
    assert_eq!(
        states,
        vec![
            JobState::Completed(0),
            JobState::Completed(0),
            JobState::Cancelled,
            JobState::Cancelled,
            JobState::Cancelled,
        ]
    );
    assert_eq!(recorder.states(JobId(2)), vec![JobState::Running, JobState::Cancelled]);
    assert_eq!(recorder.states(JobId(3)), vec![JobState::Cancelled]);
    assert_eq!(recorder.started(), vec![JobId(0), JobId(1), JobId(2)]);
    assert!(matches!(report.into_result(), Err(RunnerError::Cancelled)));
}

#[tokio::test]
async fn failing_job_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(
        dir.path(),
        &[
            "echo starting; exit 0",
            "echo 'reading gridlist' >&2; echo 'bad gridlist' >&2; exit 3",
            "sleep 0.2; exit 0",
        ],
    );
    let observer = Arc::new(RecordingObserver::new());

    let report = tokio::time::timeout(TIMEOUT, orchestrator(2, observer).run(jobs))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].state, JobState::Completed(0));
    assert_eq!(report.outcomes[1].state, JobState::Completed(3));
    assert_eq!(report.outcomes[2].state, JobState::Completed(0));

    let Err(RunnerError::Model(err)) = report.into_result() else {
        panic!("expected a model exception");
    };
    assert_eq!(err.total, 3);
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].job, JobId(1));
    assert_eq!(err.failures[0].exit_code, Some(3));
    assert_eq!(err.failures[0].stderr, vec!["reading gridlist", "bad gridlist"]);
    assert!(err.to_string().contains("bad gridlist"));
}

/// Panics on the first stdout line of one job
struct PanicOnOutput {
    job: JobId,
}

impl BatchObserver for PanicOnOutput {
    fn on_stdout(&self, job: &Job, line: &str) {
        assert_ne!(job.id, self.job, "observer rejected {line}");
    }
}

#[tokio::test]
async fn panicking_observer_still_leaves_an_outcome_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["exit 0", "echo boom", "exit 0"]);
    let orchestrator = Orchestrator::new(Arc::new(ScriptLauncher::new()), 1)
        .with_observer(Arc::new(PanicOnOutput { job: JobId(1) }));

    let report = tokio::time::timeout(TIMEOUT, orchestrator.run(jobs))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[0].state, JobState::Completed(0));
    assert!(matches!(report.outcomes[1].state, JobState::Failed(_)));
    assert_eq!(report.outcomes[2].state, JobState::Completed(0));
    assert!(matches!(orchestrator.state(JobId(1)), Some(JobState::Failed(_))));
    assert_eq!(report.summary().failed, 1);
}

#[tokio::test]
async fn only_non_empty_lines_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["echo first; echo; echo '   '; echo second"]);
    let observer = Arc::new(RecordingObserver::new());

    tokio::time::timeout(TIMEOUT, orchestrator(1, observer.clone()).run(jobs))
        .await
        .unwrap();

    assert_eq!(observer.stdout(JobId(0)), vec!["first", "second"]);
}

#[tokio::test]
async fn launch_failure_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["exit 0"]);
    let launcher = LocalLauncher::new(
        WorkerSettings::new("nc").with_executable("/nonexistent/worker-binary"),
    );
    let orchestrator = Orchestrator::new(Arc::new(launcher), 1);

    let report = tokio::time::timeout(TIMEOUT, orchestrator.run(jobs))
        .await
        .unwrap();

    assert!(matches!(report.outcomes[0].state, JobState::Failed(_)));
    assert_eq!(report.summary().failed, 1);
}

#[tokio::test]
async fn pinned_jobs_get_distinct_cpus() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = script_jobs(dir.path(), &["exec sleep 0.2"; 4]);
    let launcher = Arc::new(ScriptLauncher::new());
    let orchestrator = Orchestrator::new(launcher.clone(), 2).with_cpu_pinning(true);

    tokio::time::timeout(TIMEOUT, orchestrator.run(jobs))
        .await
        .unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 4);
    assert!(launched.iter().all(|(_, cpu)| matches!(cpu, Some(0 | 1))));
}

#[tokio::test]
async fn empty_batch_finishes_immediately() {
    let report = Orchestrator::new(Arc::new(ScriptLauncher::new()), 4)
        .run(Vec::new())
        .await;
    assert_eq!(report.summary().total, 0);
    assert!(report.into_result().is_ok());
}
