//! Factors: atomic, named changes to a config document
//!
//! [`Factor`] is a closed set of change kinds. Every consumer (naming,
//! application, serialization) matches exhaustively, so a new kind has to be
//! handled everywhere before the crate compiles again.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sweep_document::{ConfigDocument, DocumentResult, SUB_COMPONENT_BLOCK};

/// Name of the no-op factor
pub const BASELINE: &str = "Baseline";

/// A single named change to a config document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Factor {
    /// Top-level `name value`; a dotted `block.param` name is resolved by block name
    TopLevel { name: String, value: String },

    /// Parameter inside a typed, named block
    Block {
        block_type: String,
        block_name: String,
        name: String,
        value: String,
    },

    /// Ordered changes applied as one unit
    Composite { factors: Vec<Factor> },

    /// Leaves the document unchanged
    Dummy,
}

impl Factor {
    /// Top-level parameter change
    #[inline]
    #[must_use]
    pub fn top_level(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TopLevel {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Block parameter change
    #[inline]
    #[must_use]
    pub fn block(
        block_type: impl Into<String>,
        block_name: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Block {
            block_type: block_type.into(),
            block_name: block_name.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parameter change inside a sub-component block
    #[inline]
    #[must_use]
    pub fn sub_component(
        sub_component: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::block(SUB_COMPONENT_BLOCK, sub_component, name, value)
    }

    /// Composite of several factors
    #[inline]
    #[must_use]
    pub fn composite(factors: impl IntoIterator<Item = Factor>) -> Self {
        Self::Composite {
            factors: factors.into_iter().collect(),
        }
    }

    /// Deterministic display name
    ///
    /// - top-level: `name-value`
    /// - block: `block_name.name-value`
    ///
    /// Non-numeric values are shortened to their file stem, see [`short_value`].
    /// - composite: member names joined with `_`
    /// - dummy: `Baseline`
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::TopLevel { name, value } => format!("{name}-{}", short_value(value)),
            Self::Block {
                block_name,
                name,
                value,
                ..
            } => format!("{block_name}.{name}-{}", short_value(value)),
            Self::Composite { factors } => join_names(factors),
            Self::Dummy => BASELINE.to_string(),
        }
    }

    /// Apply the change to a document
    ///
    /// Composite members are applied in order, so later members win on the
    /// same key.
    ///
    /// # Errors
    /// Returns document errors for missing blocks or malformed dotted names
    pub fn apply(&self, doc: &mut ConfigDocument) -> DocumentResult<()> {
        match self {
            Self::TopLevel { name, value } => doc.apply_change(name, value),
            Self::Block {
                block_type,
                block_name,
                name,
                value,
            } => doc.set_block_parameter(block_type, block_name, name, value),
            Self::Composite { factors } => factors.iter().try_for_each(|f| f.apply(doc)),
            Self::Dummy => Ok(()),
        }
    }
}

/// Value as it appears in factor names
///
/// Numbers are kept verbatim so decimal points survive. Anything else is
/// treated as a possible path and reduced to its file stem: `"/data/grids/a.txt"`
/// becomes `a`.
#[must_use]
pub fn short_value(value: &str) -> &str {
    if value.parse::<f64>().is_ok() {
        return value;
    }
    let unquoted = value.trim_matches('"');
    Path::new(unquoted)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(unquoted)
}

/// Join factor names with `_`
#[must_use]
pub fn join_names(factors: &[Factor]) -> String {
    factors
        .iter()
        .map(Factor::name)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "npatch 5\npft \"TeBE\" (\n    sla 10\n)\n";

    #[test]
    fn names() {
        assert_eq!(Factor::top_level("npatch", "10").name(), "npatch-10");
        assert_eq!(Factor::sub_component("TeBE", "sla", "12").name(), "TeBE.sla-12");
        assert_eq!(
            Factor::composite([Factor::top_level("a", "1"), Factor::top_level("b", "2")]).name(),
            "a-1_b-2"
        );
        assert_eq!(Factor::composite([]).name(), "");
        assert_eq!(Factor::Dummy.name(), "Baseline");
    }

    #[test]
    fn path_values_are_named_by_file_stem() {
        assert_eq!(
            Factor::top_level("file_gridlist", "/data/grids/a.txt").name(),
            "file_gridlist-a"
        );
        assert_eq!(
            Factor::top_level("file_co2", "\"co2/rcp85.dat\"").name(),
            "file_co2-rcp85"
        );
        assert_eq!(Factor::top_level("firealgorithm", "blaze").name(), "firealgorithm-blaze");
        assert_eq!(Factor::sub_component("TeBE", "sla", "10.5").name(), "TeBE.sla-10.5");
        assert_eq!(Factor::top_level("shift", "-1.5e3").name(), "shift--1.5e3");
    }

    #[test]
    fn composite_applies_in_order() {
        let mut doc = ConfigDocument::parse(DOC).unwrap();
        Factor::composite([
            Factor::top_level("npatch", "7"),
            Factor::sub_component("TeBE", "sla", "11"),
            Factor::top_level("npatch", "8"),
        ])
        .apply(&mut doc)
        .unwrap();
        assert_eq!(doc.render(), "npatch 8\npft \"TeBE\" (\n    sla 11\n)\n");
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let factor = Factor::top_level("TeBE.sla", "15");
        let mut once = ConfigDocument::parse(DOC).unwrap();
        factor.apply(&mut once).unwrap();
        let mut twice = once.clone();
        factor.apply(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn dummy_leaves_document_alone() {
        let mut doc = ConfigDocument::parse(DOC).unwrap();
        Factor::Dummy.apply(&mut doc).unwrap();
        assert_eq!(doc.render(), DOC);
    }

    #[test]
    fn serializes_with_kind_tag() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            factors: Vec<Factor>,
        }
        let wrapper = Wrapper {
            factors: vec![
                Factor::sub_component("TeBE", "sla", "12"),
                Factor::composite([Factor::top_level("npatch", "1"), Factor::Dummy]),
            ],
        };
        let text = toml::to_string(&wrapper).unwrap();
        assert!(text.contains("kind = \"block\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.factors, wrapper.factors);
    }
}
