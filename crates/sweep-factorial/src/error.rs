//! Error types for factor expansion and simulation generation

use sweep_document::DocumentError;

/// Errors raised while expanding generators or writing simulations
#[derive(Debug, thiserror::Error)]
pub enum FactorialError {
    /// Generator configuration is invalid
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Applying a factor or writing the generated config failed
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl FactorialError {
    /// Create argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }
}

/// Result type for factorial operations
pub type FactorialResult<T> = Result<T, FactorialError>;
