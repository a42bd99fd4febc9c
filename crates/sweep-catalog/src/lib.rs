//! Sweep Catalog - where runs live and what produced them
//!
//! - [`NamingStrategy`]: simulation name to run key (verbatim or hashed)
//! - [`PathResolver`]: run key to run directory and generated config path
//! - [`ResultCatalog`]: per-run [`SimulationManifest`] and batch [`SimulationIndex`]

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod path;

pub use catalog::{index_path, ResultCatalog, INDEX_FILE, MANIFEST_FILE};
pub use error::{CatalogError, CatalogResult};
pub use manifest::{SimulationIndex, SimulationManifest};
pub use naming::{hash_name, NamingStrategy, DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH};
pub use path::{absolute_from, relative_to, sanitize_segment, PathResolver, CONFIG_EXTENSION};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the result catalog
    pub use crate::{
        CatalogError, CatalogResult, NamingStrategy, PathResolver, ResultCatalog,
        SimulationIndex, SimulationManifest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
