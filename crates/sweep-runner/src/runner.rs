//! Experiment execution
//!
//! [`ExperimentRunner::generate`] writes one config and manifest per
//! (base config, simulation) pair plus the batch index;
//! [`ExperimentRunner::run`] then hands the resulting jobs to the
//! [`Orchestrator`].

use crate::context::{absolute_path, BatchContext};
use crate::error::{RunnerError, RunnerResult};
use crate::experiment::ExperimentDefinition;
use crate::job::{Job, JobId};
use crate::launcher::{LocalLauncher, WorkerLauncher};
use crate::observer::{BatchObserver, NullObserver};
use crate::orchestrator::{BatchReport, Orchestrator};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use sweep_catalog::{PathResolver, ResultCatalog, SimulationIndex, SimulationManifest};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

/// Jobs and index produced by generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBatch {
    /// One job per generated config, in generation order
    pub jobs: Vec<Job>,
    /// Run directories, in the same order
    pub index: SimulationIndex,
}

/// Generates and runs the simulations of an experiment
pub struct ExperimentRunner {
    context: BatchContext,
    catalog: ResultCatalog,
    launcher: Arc<dyn WorkerLauncher>,
    observer: Arc<dyn BatchObserver>,
    cancel: CancellationToken,
}

impl ExperimentRunner {
    /// Runner launching the model binary locally
    #[must_use]
    pub fn new(context: BatchContext) -> Self {
        let launcher = Arc::new(LocalLauncher::new(context.worker.clone()));
        Self {
            context,
            catalog: ResultCatalog::new(),
            launcher,
            observer: Arc::new(NullObserver),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different launcher
    #[inline]
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn WorkerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Report batch events to `observer`
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share an external cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Batch settings
    #[inline]
    #[must_use]
    pub fn context(&self) -> &BatchContext {
        &self.context
    }

    /// Write every run's config and manifest, and the batch index
    ///
    /// A relative output root resolves against the current directory, so
    /// job paths stay valid inside the run directories.
    ///
    /// # Errors
    /// - [`RunnerError::Argument`] for invalid settings, or when two runs map
    ///   to the same directory
    /// - document, factor and catalog errors from generation
    pub fn generate(&self, experiment: &ExperimentDefinition) -> RunnerResult<GeneratedBatch> {
        self.context.validate()?;
        let simulations = experiment.simulations()?;
        let root = absolute_path(&self.context.output_root)
            .map_err(|e| RunnerError::io_error(&self.context.output_root, e))?;
        let resolver = PathResolver::new(root, self.context.naming);
        info!(
            batch = %self.context.batch_id,
            base_configs = experiment.base_configs.len(),
            simulations = simulations.len(),
            output = %resolver.output_root().display(),
            "generating simulations"
        );

        let root = resolver.output_root();
        std::fs::create_dir_all(root).map_err(|e| RunnerError::io_error(root, e))?;

        let mut seen: HashMap<PathBuf, String> = HashMap::new();
        let mut index = SimulationIndex::new();
        let mut jobs = Vec::new();
        for base in &experiment.base_configs {
            let stem = base
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            for simulation in &simulations {
                let directory = resolver.run_directory(base, &simulation.name)?;
                let name = format!("{stem}/{}", simulation.name);
                if let Some(previous) = seen.insert(directory.clone(), name.clone()) {
                    return Err(RunnerError::argument(format!(
                        "runs '{previous}' and '{name}' both map to {}",
                        directory.display()
                    )));
                }

                let config = resolver.config_path(base, &simulation.name)?;
                std::fs::create_dir_all(&directory)
                    .map_err(|e| RunnerError::io_error(&directory, e))?;
                simulation.generate(base, &config, &experiment.sub_components)?;

                let manifest = SimulationManifest::new(
                    resolver.run_key(&simulation.name),
                    simulation,
                    &directory,
                    base,
                    &config,
                    &experiment.sub_components,
                );
                self.catalog.write_simulation(&manifest)?;

                index.push(&directory);
                jobs.push(Job::new(JobId(jobs.len()), name, config));
            }
        }

        self.catalog.write_index(&resolver, &index)?;
        Ok(GeneratedBatch { jobs, index })
    }

    /// Generate, then run every job to a terminal state
    ///
    /// In a dry run the worker commands are logged instead of executed.
    ///
    /// # Errors
    /// - generation errors, see [`ExperimentRunner::generate`]
    /// - [`RunnerError::Model`] if any job failed
    /// - [`RunnerError::Cancelled`] if the batch was cancelled
    pub async fn run(&self, experiment: &ExperimentDefinition) -> RunnerResult<BatchReport> {
        let span = info_span!("batch", id = %self.context.batch_id);
        self.run_batch(experiment).instrument(span).await
    }

    async fn run_batch(&self, experiment: &ExperimentDefinition) -> RunnerResult<BatchReport> {
        let batch = self.generate(experiment)?;

        if self.context.dry_run {
            for job in &batch.jobs {
                info!(job = %job.name, command = %self.launcher.describe(job), "dry run");
            }
            return Ok(BatchReport::not_run(batch.jobs));
        }

        let orchestrator = Orchestrator::new(Arc::clone(&self.launcher), self.context.max_concurrency)
            .with_observer(Arc::clone(&self.observer))
            .with_cpu_pinning(self.context.pin_cpus)
            .with_cancellation(self.cancel.clone());
        orchestrator.run(batch.jobs).await.into_result()
    }
}
