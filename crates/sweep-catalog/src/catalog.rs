//! Result catalog: persisted manifests and batch index
//!
//! The catalog never creates directories. Run directories belong to the
//! generator; the catalog only writes into them. Files are written to a
//! temporary sibling and renamed into place.

use crate::error::{CatalogError, CatalogResult};
use crate::manifest::{SimulationIndex, SimulationManifest};
use crate::path::PathResolver;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Manifest file name inside a run directory
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Index file name inside the output root
pub const INDEX_FILE: &str = "index.toml";

/// Reads and writes manifests and indexes
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCatalog;

impl ResultCatalog {
    /// Create catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Write a manifest into its run directory
    ///
    /// # Errors
    /// - [`CatalogError::DirectoryNotFound`] if `manifest.path` does not exist
    /// - encode or IO errors
    pub fn write_simulation(&self, manifest: &SimulationManifest) -> CatalogResult<PathBuf> {
        let file = manifest.path.join(MANIFEST_FILE);
        write_toml(&manifest.path, &file, manifest)?;
        tracing::debug!(key = %manifest.key, path = %file.display(), "wrote manifest");
        Ok(file)
    }

    /// Read the manifest of a run directory
    ///
    /// # Errors
    /// - [`CatalogError::NotFound`] if the directory has no manifest
    /// - decode or IO errors
    pub fn read_manifest(&self, run_directory: &Path) -> CatalogResult<SimulationManifest> {
        let file = run_directory.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&file).map_err(|e| CatalogError::read_error(&file, e))?;
        decode(&file, &text)
    }

    /// Async variant of [`ResultCatalog::read_manifest`]
    ///
    /// # Errors
    /// Same as [`ResultCatalog::read_manifest`]
    pub async fn read_manifest_async(&self, run_directory: &Path) -> CatalogResult<SimulationManifest> {
        let file = run_directory.join(MANIFEST_FILE);
        let text = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| CatalogError::read_error(&file, e))?;
        decode(&file, &text)
    }

    /// Write the batch index under the output root
    ///
    /// Paths are stored relative to the root.
    ///
    /// # Errors
    /// - [`CatalogError::DirectoryNotFound`] if the output root does not exist
    /// - encode or IO errors
    pub fn write_index(&self, resolver: &PathResolver, index: &SimulationIndex) -> CatalogResult<PathBuf> {
        let file = index_path(resolver);
        let stored: SimulationIndex = index.iter().map(|p| resolver.relative_path(p)).collect();
        write_toml(resolver.output_root(), &file, &stored)?;
        tracing::info!(runs = index.len(), path = %file.display(), "wrote simulation index");
        Ok(file)
    }

    /// Read the batch index, with paths resolved against the output root
    ///
    /// # Errors
    /// - [`CatalogError::NotFound`] if no index has been written
    /// - decode or IO errors
    pub fn read_index(&self, resolver: &PathResolver) -> CatalogResult<SimulationIndex> {
        let file = index_path(resolver);
        let text = std::fs::read_to_string(&file).map_err(|e| CatalogError::read_error(&file, e))?;
        let stored: SimulationIndex = decode(&file, &text)?;
        Ok(stored.iter().map(|p| resolver.absolute_path(p)).collect())
    }

    /// Async variant of [`ResultCatalog::read_index`]
    ///
    /// # Errors
    /// Same as [`ResultCatalog::read_index`]
    pub async fn read_index_async(&self, resolver: &PathResolver) -> CatalogResult<SimulationIndex> {
        let file = index_path(resolver);
        let text = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| CatalogError::read_error(&file, e))?;
        let stored: SimulationIndex = decode(&file, &text)?;
        Ok(stored.iter().map(|p| resolver.absolute_path(p)).collect())
    }
}

/// Location of the index file for a resolver's output root
#[must_use]
pub fn index_path(resolver: &PathResolver) -> PathBuf {
    resolver.output_root().join(INDEX_FILE)
}

fn write_toml<T: Serialize>(directory: &Path, file: &Path, value: &T) -> CatalogResult<()> {
    if !directory.is_dir() {
        return Err(CatalogError::DirectoryNotFound {
            path: directory.to_path_buf(),
        });
    }
    let text = toml::to_string_pretty(value).map_err(|source| CatalogError::Encode {
        path: file.to_path_buf(),
        source,
    })?;

    let staging = file.with_extension("toml.tmp");
    std::fs::write(&staging, text).map_err(|e| CatalogError::io_error(&staging, e))?;
    std::fs::rename(&staging, file).map_err(|e| CatalogError::io_error(file, e))
}

fn decode<T: DeserializeOwned>(file: &Path, text: &str) -> CatalogResult<T> {
    toml::from_str(text).map_err(|source| CatalogError::Decode {
        path: file.to_path_buf(),
        source,
    })
}
