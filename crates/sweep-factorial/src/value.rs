//! Parameter values and value generators
//!
//! A [`ValueGenerator`] is a finite, restartable sequence of [`Value`]s:
//! - `Discrete`: an explicit list
//! - `Range`: `start + i * step` for `i in 0..count`, numeric only
//!
//! Values render locale-invariantly (decimal point, no grouping) so they can
//! be substituted into config text as-is.

use crate::error::{FactorialError, FactorialResult};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::iter::FusedIterator;

/// Numeric value usable as a range bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Self::Int(v),
            Number::Float(v) => Self::Float(v),
        }
    }
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Render as config text
    ///
    /// Booleans become `1`/`0`, the model's flag convention.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Arithmetic progression of numbers
///
/// Integer bounds produce integers; any float bound produces floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub start: Number,
    pub step: Number,
    pub count: usize,
}

impl NumericRange {
    /// Value at position `index`
    ///
    /// Integer values saturate at the `i64` bounds; [`NumericRange::validate`]
    /// rejects ranges that would reach them.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn nth_value(&self, index: usize) -> Number {
        match (self.start, self.step) {
            (Number::Int(start), Number::Int(step)) => {
                let index = i64::try_from(index).unwrap_or(i64::MAX);
                Number::Int(start.saturating_add(step.saturating_mul(index)))
            }
            (start, step) => Number::Float(start.as_f64() + step.as_f64() * index as f64),
        }
    }

    /// Check that every value is representable
    ///
    /// # Errors
    /// Returns [`FactorialError::Argument`] if an integer range overflows
    /// `i64` or a float range leaves the finite numbers
    pub fn validate(&self) -> FactorialResult<()> {
        let Some(last) = self.count.checked_sub(1) else {
            return Ok(());
        };
        let representable = match (self.start, self.step) {
            (Number::Int(start), Number::Int(step)) => i64::try_from(last)
                .ok()
                .and_then(|last| step.checked_mul(last))
                .and_then(|offset| start.checked_add(offset))
                .is_some(),
            _ => match self.nth_value(last) {
                Number::Float(v) => v.is_finite() && self.start.as_f64().is_finite(),
                Number::Int(_) => true,
            },
        };
        if representable {
            Ok(())
        } else {
            Err(FactorialError::argument(format!(
                "range of {} values from {} in steps of {} overflows",
                self.count,
                Value::from(self.start),
                Value::from(self.step)
            )))
        }
    }
}

/// Finite, restartable sequence of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueGenerator {
    Discrete(Vec<Value>),
    Range(NumericRange),
}

impl ValueGenerator {
    /// Explicit list of values
    #[must_use]
    pub fn discrete<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Discrete(values.into_iter().map(Into::into).collect())
    }

    /// `count` values starting at `start`, `step` apart
    #[inline]
    #[must_use]
    pub fn range(start: impl Into<Number>, step: impl Into<Number>, count: usize) -> Self {
        Self::Range(NumericRange {
            start: start.into(),
            step: step.into(),
            count,
        })
    }

    /// Number of values produced
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Discrete(values) => values.len(),
            Self::Range(range) => range.count,
        }
    }

    /// Check that every value is representable
    ///
    /// # Errors
    /// See [`NumericRange::validate`]
    pub fn validate(&self) -> FactorialResult<()> {
        match self {
            Self::Discrete(_) => Ok(()),
            Self::Range(range) => range.validate(),
        }
    }

    /// Whether the sequence is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the values; each call starts from the beginning
    #[inline]
    #[must_use]
    pub fn generate(&self) -> Values<'_> {
        Values {
            generator: self,
            index: 0,
        }
    }

    /// Iterate the values rendered as config text
    pub fn rendered(&self) -> impl Iterator<Item = String> + '_ {
        self.generate().map(|v| v.render())
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Iterator over a [`ValueGenerator`]
#[derive(Debug, Clone)]
pub struct Values<'a> {
    generator: &'a ValueGenerator,
    index: usize,
}

impl Iterator for Values<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let value = match self.generator {
            ValueGenerator::Discrete(values) => values.get(self.index)?.clone(),
            ValueGenerator::Range(range) if self.index < range.count => {
                range.nth_value(self.index).into()
            }
            ValueGenerator::Range(_) => return None,
        };
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.generator.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Values<'_> {}

impl FusedIterator for Values<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_range() {
        let gen = ValueGenerator::range(10_i64, 5_i64, 4);
        let values: Vec<String> = gen.rendered().collect();
        assert_eq!(values, vec!["10", "15", "20", "25"]);
    }

    #[test]
    fn float_range_uses_decimal_point() {
        let gen = ValueGenerator::range(0.5_f64, 0.25_f64, 3);
        let values: Vec<String> = gen.rendered().collect();
        assert_eq!(values, vec!["0.5", "0.75", "1"]);
    }

    #[test]
    fn mixed_bounds_promote_to_float() {
        let gen = ValueGenerator::range(1_i64, 0.5_f64, 2);
        assert_eq!(gen.generate().collect::<Vec<_>>(), vec![Value::Float(1.0), Value::Float(1.5)]);
    }

    #[test]
    fn generation_is_restartable() {
        let gen = ValueGenerator::discrete(["a", "b"]);
        let first: Vec<_> = gen.generate().collect();
        let second: Vec<_> = gen.generate().collect();
        assert_eq!(first, second);
        assert_eq!(gen.generate().len(), 2);
    }

    #[test]
    fn booleans_render_as_flags() {
        let gen = ValueGenerator::discrete([true, false]);
        assert_eq!(gen.rendered().collect::<Vec<_>>(), vec!["1", "0"]);
    }

    #[test]
    fn overflowing_integer_range_is_rejected() {
        let gen = ValueGenerator::range(i64::MAX - 10, 5_i64, 4);
        assert!(matches!(gen.validate(), Err(FactorialError::Argument(_))));
        // iteration saturates instead of panicking
        assert_eq!(gen.generate().last(), Some(Value::Int(i64::MAX)));

        let ok = ValueGenerator::range(i64::MAX - 10, 5_i64, 3);
        assert!(ok.validate().is_ok());
        assert!(ValueGenerator::range(i64::MIN, -1_i64, 2).validate().is_err());
        assert!(ValueGenerator::range(f64::MAX, f64::MAX, 2).validate().is_err());
        assert!(ValueGenerator::range(0_i64, 1_i64, 0).validate().is_ok());
    }

    #[test]
    fn empty_range() {
        let gen = ValueGenerator::range(0_i64, 1_i64, 0);
        assert!(gen.is_empty());
        assert_eq!(gen.generate().next(), None);
    }
}
