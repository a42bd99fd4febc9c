//! Error types for config documents
//!
//! Covers:
//! - Malformed config text (unterminated blocks, import cycles)
//! - Typed accessor failures
//! - Edits addressed at blocks that do not exist
//! - File I/O while loading or saving

use std::path::PathBuf;

/// Errors raised while parsing, reading or editing a config document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed config text
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// Parameter value could not be coerced to the requested type
    #[error("parameter '{name}' has value '{raw}' which is not a valid {expected}")]
    TypeMismatch {
        name: String,
        raw: String,
        expected: &'static str,
    },

    /// No block with the given type/name exists
    #[error("no {block_type} block named '{name}'")]
    BlockNotFound { block_type: String, name: String },

    /// Block is opened and closed on its header line and cannot take new parameters
    #[error("{block_type} block '{name}' is declared inline and cannot be extended")]
    InlineBlock { block_type: String, name: String },

    /// Dotted parameter name is not of the form `block.param`
    #[error("invalid parameter name '{0}': expected 'name' or 'block.param'")]
    InvalidParameterName(String),

    /// Internal pattern failed to compile
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error reading or writing a config file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Create format error for a 1-based line number
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create block-not-found error
    pub fn block_not_found(block_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::BlockNotFound {
            block_type: block_type.into(),
            name: name.into(),
        }
    }

    /// Check if the error means something the caller asked for is absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlockNotFound { .. })
            || matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
