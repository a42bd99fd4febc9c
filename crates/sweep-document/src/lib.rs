//! Sweep Document - format-preserving config editing
//!
//! Parses the block-structured, line-oriented config format used by the
//! model and lets callers edit it without disturbing anything they did not
//! touch:
//! - Top-level `name value` parameters
//! - Typed, named blocks: `pft "TeBE" ( ... )`
//! - `!` comments, quoted strings, mixed line endings
//!
//! # Example
//!
//! ```rust
//! use sweep_document::ConfigDocument;
//!
//! let mut doc = ConfigDocument::parse("npatch 5 ! patches\npft \"TeBE\" (\n  sla 10\n)\n")?;
//! doc.set_top_level_parameter("npatch", "10");
//! doc.set_block_parameter("pft", "TeBE", "sla", "12.5")?;
//! assert_eq!(doc.render(), "npatch 10 ! patches\npft \"TeBE\" (\n  sla 12.5\n)\n");
//! # Ok::<(), sweep_document::DocumentError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod document;
pub mod error;
pub mod normalise;
pub mod value;

pub use document::{ConfigDocument, COMMENT_MARKER, INCLUDE_PARAMETER, SUB_COMPONENT_BLOCK};
pub use error::{DocumentError, DocumentResult};
pub use value::{quote_if_needed, unquote, Parameter};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with config documents
    pub use crate::{ConfigDocument, DocumentError, DocumentResult, Parameter};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
