//! Factor generators
//!
//! A generator pairs a parameter locator with a [`ValueGenerator`] and yields
//! one [`Factor`] per value, in value order.

use crate::error::{FactorialError, FactorialResult};
use crate::factor::Factor;
use crate::value::ValueGenerator;
use serde::{Deserialize, Serialize};

/// Rule expanding one parameter into many factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorGenerator {
    /// Top-level (or dotted `block.param`) parameter
    TopLevel { name: String, values: ValueGenerator },

    /// Parameter inside a typed, named block
    Block {
        block_type: String,
        block_name: String,
        name: String,
        values: ValueGenerator,
    },

    /// Explicit list of ready-made factors
    Simple { levels: Vec<Factor> },
}

impl FactorGenerator {
    /// Generator over a top-level parameter
    #[inline]
    #[must_use]
    pub fn top_level(name: impl Into<String>, values: ValueGenerator) -> Self {
        Self::TopLevel {
            name: name.into(),
            values,
        }
    }

    /// Generator over a block parameter
    #[inline]
    #[must_use]
    pub fn block(
        block_type: impl Into<String>,
        block_name: impl Into<String>,
        name: impl Into<String>,
        values: ValueGenerator,
    ) -> Self {
        Self::Block {
            block_type: block_type.into(),
            block_name: block_name.into(),
            name: name.into(),
            values,
        }
    }

    /// Generator over fixed factors
    #[inline]
    #[must_use]
    pub fn simple(levels: impl IntoIterator<Item = Factor>) -> Self {
        Self::Simple {
            levels: levels.into_iter().collect(),
        }
    }

    /// Produce the factors, one per value
    #[must_use]
    pub fn generate(&self) -> Vec<Factor> {
        match self {
            Self::TopLevel { name, values } => values
                .rendered()
                .map(|value| Factor::top_level(name.as_str(), value))
                .collect(),
            Self::Block {
                block_type,
                block_name,
                name,
                values,
            } => values
                .rendered()
                .map(|value| {
                    Factor::block(block_type.as_str(), block_name.as_str(), name.as_str(), value)
                })
                .collect(),
            Self::Simple { levels } => levels.clone(),
        }
    }

    /// Number of factors produced
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::TopLevel { values, .. } | Self::Block { values, .. } => values.len(),
            Self::Simple { levels } => levels.len(),
        }
    }

    /// Whether no factors are produced
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every value can be generated
    ///
    /// # Errors
    /// Returns [`FactorialError::Argument`] naming this generator if its
    /// range overflows
    pub fn validate(&self) -> FactorialResult<()> {
        match self {
            Self::TopLevel { values, .. } | Self::Block { values, .. } => {
                values.validate().map_err(|e| match e {
                    FactorialError::Argument(message) => {
                        FactorialError::argument(format!("{}: {message}", self.label()))
                    }
                    other => other,
                })
            }
            Self::Simple { .. } => Ok(()),
        }
    }

    /// Human-readable locator, for diagnostics
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::TopLevel { name, .. } => name.clone(),
            Self::Block {
                block_name, name, ..
            } => format!("{block_name}.{name}"),
            Self::Simple { levels } => format!("{} fixed levels", levels.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_factor_per_value_in_order() {
        let gen = FactorGenerator::block(
            "pft",
            "TeBE",
            "sla",
            ValueGenerator::range(10_i64, 2_i64, 3),
        );
        let names: Vec<String> = gen.generate().iter().map(Factor::name).collect();
        assert_eq!(names, vec!["TeBE.sla-10", "TeBE.sla-12", "TeBE.sla-14"]);
        assert_eq!(gen.len(), 3);
    }

    #[test]
    fn simple_returns_levels() {
        let gen = FactorGenerator::simple([Factor::Dummy, Factor::top_level("a", "1")]);
        assert_eq!(gen.generate(), vec![Factor::Dummy, Factor::top_level("a", "1")]);
    }
}
