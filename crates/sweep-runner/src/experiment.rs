//! Experiment definition files
//!
//! An experiment is a TOML file naming the base configs, the parameters to
//! vary and how to run the result:
//!
//! ```toml
//! insfiles = ["global.ins"]
//! pfts = ["TeBE", "C3G"]
//! output_directory = "out"
//! input_module = "nc"
//! cpu_count = 4
//!
//! [parameters]
//! npatch = [5, 10]
//! nyear_spinup = { start = 500, step = 250, count = 3 }
//!
//! [parameters.TeBE]
//! sla = [10.5, 12.0]
//!
//! [parameters.pft.C3G]
//! include = [0, 1]
//! ```
//!
//! Parameter order in the file is generator order, so the first parameter
//! varies slowest in a full factorial.

use crate::context::{absolute_path, available_cpus, BatchContext, WorkerSettings, DEFAULT_WORKER};
use crate::error::{RunnerError, RunnerResult};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sweep_catalog::NamingStrategy;
use sweep_factorial::{FactorGenerator, NumericRange, Simulation, SimulationGenerator, Value, ValueGenerator};

/// Run naming as written in the experiment file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NamingKind {
    #[default]
    Manual,
    Hashed,
}

/// Raw file contents
#[derive(Debug, Deserialize)]
struct ExperimentFile {
    insfiles: Vec<PathBuf>,
    #[serde(default)]
    pfts: Vec<String>,
    #[serde(default = "default_full_factorial")]
    full_factorial: bool,
    #[serde(default)]
    dry_run: bool,
    cpu_count: Option<usize>,
    output_directory: PathBuf,
    guess_path: Option<PathBuf>,
    input_module: String,
    #[serde(default)]
    naming: NamingKind,
    hash_length: Option<usize>,
    #[serde(default)]
    pin_cpus: bool,
    #[serde(default)]
    parameters: IndexMap<String, ParameterSpec>,
}

fn default_full_factorial() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParameterSpec {
    Values(Vec<Value>),
    Range(NumericRange),
    Table(IndexMap<String, ParameterSpec>),
}

/// A validated experiment
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentDefinition {
    /// Base configs, resolved against the experiment file's directory
    pub base_configs: Vec<PathBuf>,
    /// Sub-components to keep enabled; empty keeps the base config's choice
    pub sub_components: Vec<String>,
    /// One generator per varied parameter, in file order
    pub generators: Vec<FactorGenerator>,
    pub full_factorial: bool,
    pub dry_run: bool,
    pub cpu_count: usize,
    pub output_directory: PathBuf,
    pub worker: WorkerSettings,
    pub naming: NamingStrategy,
    pub pin_cpus: bool,
}

impl ExperimentDefinition {
    /// Read and validate an experiment file
    ///
    /// Relative paths inside the file resolve against its directory, made
    /// absolute first.
    ///
    /// # Errors
    /// Returns [`RunnerError::Experiment`] if the file cannot be read, parsed
    /// or validated
    pub fn from_file(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RunnerError::experiment(path, e.to_string()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let base_dir =
            absolute_path(base_dir).map_err(|e| RunnerError::experiment(path, e.to_string()))?;
        Self::parse(&text, &base_dir).map_err(|e| match e {
            RunnerError::Argument(message) => RunnerError::experiment(path, message),
            other => other,
        })
    }

    /// Parse experiment text; relative paths resolve against `base_dir`
    ///
    /// # Errors
    /// Returns [`RunnerError::Argument`] for malformed or invalid settings
    pub fn parse(text: &str, base_dir: &Path) -> RunnerResult<Self> {
        let file: ExperimentFile =
            toml::from_str(text).map_err(|e| RunnerError::argument(e.to_string()))?;

        if file.insfiles.is_empty() {
            return Err(RunnerError::argument("no insfiles given"));
        }
        if file.input_module.trim().is_empty() {
            return Err(RunnerError::argument("input_module must not be empty"));
        }

        let cpus = available_cpus();
        let cpu_count = file.cpu_count.unwrap_or(cpus);
        if cpu_count == 0 || cpu_count > cpus {
            return Err(RunnerError::argument(format!(
                "cpu_count must be between 1 and {cpus}, got {cpu_count}"
            )));
        }

        let naming = match file.naming {
            NamingKind::Manual => NamingStrategy::Manual,
            NamingKind::Hashed => NamingStrategy::hashed(
                file.hash_length.unwrap_or(sweep_catalog::DEFAULT_HASH_LENGTH),
            )
            .map_err(|e| RunnerError::argument(e.to_string()))?,
        };

        let executable = file.guess_path.map_or_else(
            || PathBuf::from(DEFAULT_WORKER),
            |exe| {
                // Bare names are looked up through PATH
                if exe.components().count() > 1 {
                    base_dir.join(exe)
                } else {
                    exe
                }
            },
        );

        Ok(Self {
            base_configs: file.insfiles.iter().map(|p| base_dir.join(p)).collect(),
            sub_components: file.pfts,
            generators: lower_parameters(file.parameters)?,
            full_factorial: file.full_factorial,
            dry_run: file.dry_run,
            cpu_count,
            output_directory: base_dir.join(file.output_directory),
            worker: WorkerSettings::new(file.input_module).with_executable(executable),
            naming,
            pin_cpus: file.pin_cpus,
        })
    }

    /// Every simulation of the experiment, in generation order
    ///
    /// An experiment without parameters has a single baseline simulation.
    ///
    /// # Errors
    /// Returns an argument error for empty generators or, when not full
    /// factorial, generators of unequal length
    pub fn simulations(&self) -> RunnerResult<Vec<Simulation>> {
        if self.generators.is_empty() {
            return Ok(vec![Simulation::baseline()]);
        }
        Ok(SimulationGenerator::new(self.generators.clone(), self.full_factorial).simulations()?)
    }

    /// Batch settings for this experiment
    #[must_use]
    pub fn context(&self) -> BatchContext {
        BatchContext::new(self.output_directory.clone(), self.worker.clone())
            .with_max_concurrency(self.cpu_count)
            .with_naming(self.naming)
            .with_cpu_pinning(self.pin_cpus)
            .with_dry_run(self.dry_run)
    }
}

/// Turn the `[parameters]` table into generators, in file order
fn lower_parameters(parameters: IndexMap<String, ParameterSpec>) -> RunnerResult<Vec<FactorGenerator>> {
    let mut generators = Vec::new();
    for (name, spec) in parameters {
        match spec {
            ParameterSpec::Table(table) => {
                for (inner, spec) in table {
                    match spec {
                        ParameterSpec::Table(block) => {
                            for (param, spec) in block {
                                let values = leaf_values(&format!("{name}.{inner}.{param}"), spec)?;
                                generators.push(FactorGenerator::block(&name, &inner, param, values));
                            }
                        }
                        leaf => {
                            let dotted = format!("{name}.{inner}");
                            let values = leaf_values(&dotted, leaf)?;
                            generators.push(FactorGenerator::top_level(dotted, values));
                        }
                    }
                }
            }
            leaf => {
                let values = leaf_values(&name, leaf)?;
                generators.push(FactorGenerator::top_level(name, values));
            }
        }
    }
    Ok(generators)
}

fn leaf_values(label: &str, spec: ParameterSpec) -> RunnerResult<ValueGenerator> {
    let values = match spec {
        ParameterSpec::Values(values) => ValueGenerator::Discrete(values),
        ParameterSpec::Range(range) => ValueGenerator::Range(range),
        ParameterSpec::Table(_) => {
            return Err(RunnerError::argument(format!(
                "parameter '{label}' is nested too deeply"
            )))
        }
    };
    if values.is_empty() {
        return Err(RunnerError::argument(format!("no values provided for parameter '{label}'")));
    }
    values
        .validate()
        .map_err(|e| RunnerError::argument(format!("parameter '{label}': {e}")))?;
    Ok(values)
}
