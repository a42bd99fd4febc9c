//! Sweep Runner - experiment definitions and parallel model runs
//!
//! - [`ExperimentDefinition`]: TOML experiment file, validated
//! - [`BatchContext`]: output root, concurrency, naming, worker settings
//! - [`ExperimentRunner`]: writes configs, manifests and index, then runs them
//! - [`Orchestrator`]: bounded-parallel worker execution with cancellation
//! - [`BatchObserver`]: worker output, job states and progress
//!
//! ## Example
//!
//! ```no_run
//! use sweep_runner::prelude::*;
//!
//! # async fn example() -> RunnerResult<()> {
//! let experiment = ExperimentDefinition::from_file("experiment.toml")?;
//! let report = ExperimentRunner::new(experiment.context())
//!     .run(&experiment)
//!     .await?;
//! println!("{} simulations succeeded", report.summary().succeeded);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod affinity;
pub mod context;
pub mod error;
pub mod experiment;
pub mod job;
pub mod launcher;
pub mod observer;
pub mod orchestrator;
pub mod runner;

pub use affinity::{CpuSlot, CpuSlots};
pub use context::{absolute_path, available_cpus, BatchContext, BatchId, WorkerSettings, DEFAULT_WORKER, INPUT_MODULE_FLAG};
pub use error::{JobFailure, ModelException, RunnerError, RunnerResult};
pub use experiment::ExperimentDefinition;
pub use job::{Job, JobId, JobOutcome, JobState};
pub use launcher::{has_exited, terminate, LocalLauncher, WorkerLauncher, KILL_TIMEOUT, TASKSET};
pub use observer::{format_progress, BatchObserver, ConsoleObserver, NullObserver, Progress};
pub use orchestrator::{BatchReport, BatchSummary, Orchestrator, STDERR_TAIL_LINES};
pub use runner::{ExperimentRunner, GeneratedBatch};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for defining and running experiments
    pub use crate::{
        BatchContext, BatchObserver, BatchReport, ExperimentDefinition, ExperimentRunner, Job,
        JobId, JobState, Orchestrator, RunnerError, RunnerResult, WorkerLauncher,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
