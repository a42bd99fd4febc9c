//! Error types for the result catalog
//!
//! Covers:
//! - Missing manifests and indexes
//! - Write targets whose directory does not exist
//! - Names that cannot become path segments
//! - TOML encode/decode and file I/O

use std::path::PathBuf;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Manifest or index file does not exist
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Directory to write into does not exist
    #[error("directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Name or setting rejected
    #[error("invalid argument: {0}")]
    Argument(String),

    /// TOML encoding failed
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    /// TOML decoding failed
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// IO error
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Create IO error for path, mapping a missing file to [`CatalogError::NotFound`]
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
