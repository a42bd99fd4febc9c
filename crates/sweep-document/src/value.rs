//! Typed views over raw parameter tokens
//!
//! Values are kept exactly as written in the file. Accessors coerce on demand
//! and report [`DocumentError::TypeMismatch`] naming the parameter and token.

use crate::error::{DocumentError, DocumentResult};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// A parameter occurrence as seen through a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter<'a> {
    name: &'a str,
    raw: &'a str,
}

impl<'a> Parameter<'a> {
    /// Create a view over a name and its raw value token
    #[inline]
    #[must_use]
    pub fn new(name: &'a str, raw: &'a str) -> Self {
        Self { name, raw }
    }

    /// Parameter name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Value token exactly as written, quotes included
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Whether the value is a quoted string
    #[inline]
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        is_quoted(self.raw)
    }

    /// Value with surrounding quotes removed
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        unquote(self.raw)
    }

    /// Parse as integer
    ///
    /// # Errors
    /// Returns [`DocumentError::TypeMismatch`] if the token is not an integer
    pub fn as_int(&self) -> DocumentResult<i64> {
        self.as_str()
            .parse()
            .map_err(|_| self.mismatch("integer"))
    }

    /// Parse as floating point number
    ///
    /// # Errors
    /// Returns [`DocumentError::TypeMismatch`] if the token is not numeric
    pub fn as_float(&self) -> DocumentResult<f64> {
        self.as_str()
            .parse()
            .map_err(|_| self.mismatch("number"))
    }

    /// Parse a `0`/`1` flag
    ///
    /// # Errors
    /// Returns [`DocumentError::TypeMismatch`] for any other token
    pub fn as_bool(&self) -> DocumentResult<bool> {
        match self.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(self.mismatch("boolean flag")),
        }
    }

    /// Parse a whitespace-separated list of numbers
    ///
    /// # Errors
    /// Returns [`DocumentError::TypeMismatch`] if any element is not numeric
    pub fn as_float_array(&self) -> DocumentResult<Vec<f64>> {
        self.as_str()
            .split_whitespace()
            .map(|token| token.parse().map_err(|_| self.mismatch("number list")))
            .collect()
    }

    fn mismatch(&self, expected: &'static str) -> DocumentError {
        DocumentError::TypeMismatch {
            name: self.name.to_string(),
            raw: self.raw.to_string(),
            expected,
        }
    }
}

impl Display for Parameter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.raw)
    }
}

/// Whether a token is wrapped in double quotes
#[inline]
#[must_use]
pub fn is_quoted(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('"') && token.ends_with('"')
}

/// Strip one pair of surrounding double quotes, if present
#[must_use]
pub fn unquote(token: &str) -> &str {
    if is_quoted(token) {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Render a user-supplied value as a config token
///
/// Numbers (and lists of numbers) are written bare, quoted strings are kept,
/// anything else is wrapped in quotes.
#[must_use]
pub fn quote_if_needed(value: &str) -> Cow<'_, str> {
    let trimmed = value.trim();
    if is_quoted(trimmed) || is_numeric(trimmed) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("\"{trimmed}\""))
    }
}

fn is_numeric(token: &str) -> bool {
    let mut parts = token.split_whitespace().peekable();
    parts.peek().is_some()
        && parts.all(|part| {
            part.chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
                && part.parse::<f64>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_coerce_tokens() {
        let p = Parameter::new("npatch", "15");
        assert_eq!(p.as_int().unwrap(), 15);
        assert!((p.as_float().unwrap() - 15.0).abs() < f64::EPSILON);

        let s = Parameter::new("title", "\"control run\"");
        assert!(s.is_quoted());
        assert_eq!(s.as_str(), "control run");

        let arr = Parameter::new("rootdist", "0.6 0.4");
        assert_eq!(arr.as_float_array().unwrap(), vec![0.6, 0.4]);

        assert!(Parameter::new("include", "1").as_bool().unwrap());
    }

    #[test]
    fn type_mismatch_names_parameter_and_token() {
        let err = Parameter::new("npatch", "\"many\"").as_int().unwrap_err();
        match err {
            DocumentError::TypeMismatch { name, raw, .. } => {
                assert_eq!(name, "npatch");
                assert_eq!(raw, "\"many\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn user_input_quoting() {
        assert_eq!(quote_if_needed("0.5"), "0.5");
        assert_eq!(quote_if_needed("1 2 3"), "1 2 3");
        assert_eq!(quote_if_needed("\"x.txt\""), "\"x.txt\"");
        assert_eq!(quote_if_needed("grass"), "\"grass\"");
        assert_eq!(quote_if_needed(""), "\"\"");
    }
}
