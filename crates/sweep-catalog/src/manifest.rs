//! Provenance records
//!
//! - [`SimulationManifest`]: how one run was generated; written once, never edited
//! - [`SimulationIndex`]: ordered run directories of one batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sweep_factorial::{Factor, Simulation};

/// Record of one generated run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationManifest {
    /// Run key produced by the naming strategy
    pub key: String,
    /// Simulation display name
    pub name: String,
    /// Run directory
    pub path: PathBuf,
    /// Base config the run was derived from
    pub base_config: PathBuf,
    /// Generated config file
    pub config: PathBuf,
    /// Sub-components enabled for the run (empty: as in base config)
    pub sub_components: Vec<String>,
    /// Generation time
    pub generated_at: DateTime<Utc>,
    /// Factors applied, in application order
    pub factors: Vec<Factor>,
}

impl SimulationManifest {
    /// Manifest for a simulation generated now
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        simulation: &Simulation,
        path: impl Into<PathBuf>,
        base_config: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
        sub_components: &[String],
    ) -> Self {
        Self {
            key: key.into(),
            name: simulation.name.clone(),
            path: path.into(),
            base_config: base_config.into(),
            config: config.into(),
            sub_components: sub_components.to_vec(),
            generated_at: Utc::now(),
            factors: simulation.factors.clone(),
        }
    }
}

/// Run directories of one batch, in generation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationIndex {
    pub simulations: Vec<PathBuf>,
}

impl SimulationIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run directory
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.simulations.push(path.into());
    }

    /// Number of runs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.simulations.len()
    }

    /// Whether the index is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.simulations.is_empty()
    }

    /// Iterate run directories
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.simulations.iter().map(PathBuf::as_path)
    }
}

impl FromIterator<PathBuf> for SimulationIndex {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            simulations: iter.into_iter().collect(),
        }
    }
}
