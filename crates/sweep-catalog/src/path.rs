//! Run directory layout and path conversion
//!
//! Layout under the output root:
//! `{root}/{base_config_stem}/{run_key}/{run_key}.cfg`, with the run's
//! manifest beside the config and the batch index at `{root}/index.toml`.
//!
//! All conversions are lexical; nothing here touches the filesystem.

use crate::error::{CatalogError, CatalogResult};
use crate::naming::{hash_name, NamingStrategy};
use std::path::{Path, PathBuf};

/// Extension of generated config files
pub const CONFIG_EXTENSION: &str = "cfg";

/// Longest directory segment produced by [`sanitize_segment`]
pub const MAX_SEGMENT_LENGTH: usize = 64;

/// Digest length appended to shortened segments
const SEGMENT_DIGEST_LENGTH: usize = 16;

/// Make a name safe to use as one path segment
///
/// Whitespace becomes `_`, and separators and anything outside
/// `[A-Za-z0-9._+=-]` are dropped. A longer result keeps its first
/// characters and ends in `-` plus a digest of the whole name, so names
/// that differ only past the limit still get distinct segments of at most
/// [`MAX_SEGMENT_LENGTH`] characters.
///
/// # Errors
/// Returns [`CatalogError::Argument`] if nothing usable remains
pub fn sanitize_segment(name: &str) -> CatalogResult<String> {
    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '=') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(CatalogError::argument(format!(
            "'{name}' does not contain any characters usable in a path"
        )));
    }
    if cleaned.len() <= MAX_SEGMENT_LENGTH {
        return Ok(cleaned);
    }

    // only ASCII survives the filter, so byte and char positions agree
    let mut shortened = cleaned;
    shortened.truncate(MAX_SEGMENT_LENGTH - SEGMENT_DIGEST_LENGTH - 1);
    shortened.push('-');
    shortened.push_str(&hash_name(name, SEGMENT_DIGEST_LENGTH));
    Ok(shortened)
}

/// `path` relative to `root`; relative paths and paths outside `root` pass through
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}

/// `path` joined onto `root`; absolute paths pass through
#[must_use]
pub fn absolute_from(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Maps simulations to run directories under an output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    output_root: PathBuf,
    naming: NamingStrategy,
}

impl PathResolver {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>, naming: NamingStrategy) -> Self {
        Self {
            output_root: output_root.into(),
            naming,
        }
    }

    /// Output root
    #[inline]
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Naming strategy
    #[inline]
    #[must_use]
    pub fn naming(&self) -> NamingStrategy {
        self.naming
    }

    /// Run key for a simulation name
    #[must_use]
    pub fn run_key(&self, simulation_name: &str) -> String {
        self.naming.resolve(simulation_name)
    }

    /// `{root}/{base_stem}/{run_key}`
    ///
    /// # Errors
    /// Returns [`CatalogError::Argument`] if either segment sanitises to nothing
    pub fn run_directory(&self, base_config: &Path, simulation_name: &str) -> CatalogResult<PathBuf> {
        let stem = base_config
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        Ok(self
            .output_root
            .join(sanitize_segment(&stem)?)
            .join(sanitize_segment(&self.run_key(simulation_name))?))
    }

    /// `{root}/{base_stem}/{run_key}/{run_key}.cfg`
    ///
    /// # Errors
    /// Same as [`PathResolver::run_directory`]
    pub fn config_path(&self, base_config: &Path, simulation_name: &str) -> CatalogResult<PathBuf> {
        let segment = sanitize_segment(&self.run_key(simulation_name))?;
        Ok(self
            .run_directory(base_config, simulation_name)?
            .join(format!("{segment}.{CONFIG_EXTENSION}")))
    }

    /// Path relative to the output root
    #[must_use]
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        relative_to(&self.output_root, path)
    }

    /// Path resolved against the output root
    #[must_use]
    pub fn absolute_path(&self, path: &Path) -> PathBuf {
        absolute_from(&self.output_root, path)
    }
}
