//! Naming strategies for run identifiers
//!
//! - `Manual`: the simulation name, verbatim
//! - `Hashed`: hex SHA-256 of the name, truncated to a fixed length

use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default length of hashed names
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Longest hashed name (full SHA-256 hex digest)
pub const MAX_HASH_LENGTH: usize = 64;

/// Turns a simulation name into a run key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum NamingStrategy {
    #[default]
    Manual,
    Hashed { length: usize },
}

impl NamingStrategy {
    /// Hashed naming with the given output length
    ///
    /// # Errors
    /// Returns [`CatalogError::Argument`] unless `1 <= length <= 64`
    pub fn hashed(length: usize) -> CatalogResult<Self> {
        if length == 0 || length > MAX_HASH_LENGTH {
            return Err(CatalogError::argument(format!(
                "hash length must be between 1 and {MAX_HASH_LENGTH}, got {length}"
            )));
        }
        Ok(Self::Hashed { length })
    }

    /// Resolve a simulation name to its run key
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        match self {
            Self::Manual => name.to_string(),
            Self::Hashed { length } => hash_name(name, *length),
        }
    }
}

/// Hex SHA-256 of `name`, truncated to `length` characters
#[must_use]
pub fn hash_name(name: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(length.min(MAX_HASH_LENGTH));
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_is_identity() {
        assert_eq!(NamingStrategy::Manual.resolve("a-1_b-2"), "a-1_b-2");
    }

    #[test]
    fn hashed_is_deterministic_and_sized() {
        let naming = NamingStrategy::hashed(12).unwrap();
        let a = naming.resolve("npatch-5_TeBE.sla-10");
        assert_eq!(a, naming.resolve("npatch-5_TeBE.sla-10"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, naming.resolve("npatch-5_TeBE.sla-12"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_digest_prefix() {
        // sha256("abc")
        assert_eq!(hash_name("abc", DEFAULT_HASH_LENGTH), "ba7816bf8f01cfea");
        assert_eq!(hash_name("abc", MAX_HASH_LENGTH).len(), 64);
    }

    #[test]
    fn length_is_validated() {
        assert!(NamingStrategy::hashed(0).is_err());
        assert!(NamingStrategy::hashed(65).is_err());
        assert!(NamingStrategy::hashed(64).is_ok());
    }
}
