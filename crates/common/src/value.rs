//! Runtime value representation for the HelmScript VM.
//!
//! Values live on the operand stack, in variable slots, and inside
//! `Push` opcodes. The representation is a closed tagged enum; every
//! consumer dispatches exhaustively over the tag.

use std::fmt;

/// A runtime value.
///
/// All numerics are 64-bit floats; the language has no integer type.
/// `Empty` is the defined sentinel returned when popping an empty
/// operand stack — it is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// IEEE 754 64-bit float.
    Scalar(f64),
    /// String value.
    Text(String),
    /// The empty sentinel.
    Empty,
}

impl Value {
    /// Boolean interpretation: booleans are themselves, scalars are
    /// true when nonzero. Text and Empty have no boolean reading.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Scalar(n) => Some(*n != 0.0),
            Value::Text(_) | Value::Empty => None,
        }
    }

    /// Numeric interpretation: scalars are themselves, booleans read
    /// as 1 and 0.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(n) => Some(*n),
            Value::Bool(true) => Some(1.0),
            Value::Bool(false) => Some(0.0),
            Value::Text(_) | Value::Empty => None,
        }
    }

    /// Short tag name used in error messages.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Scalar(_) => "scalar",
            Value::Text(_) => "text",
            Value::Empty => "empty",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Scalar(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Empty => write!(f, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_of_bools_and_scalars() {
        assert_eq!(Value::Bool(true).truthiness(), Some(true));
        assert_eq!(Value::Bool(false).truthiness(), Some(false));
        assert_eq!(Value::Scalar(0.0).truthiness(), Some(false));
        assert_eq!(Value::Scalar(-2.5).truthiness(), Some(true));
    }

    #[test]
    fn text_and_empty_have_no_truthiness() {
        assert_eq!(Value::Text("true".into()).truthiness(), None);
        assert_eq!(Value::Empty.truthiness(), None);
    }

    #[test]
    fn scalar_interpretation() {
        assert_eq!(Value::Scalar(3.5).as_scalar(), Some(3.5));
        assert_eq!(Value::Bool(true).as_scalar(), Some(1.0));
        assert_eq!(Value::Text("3".into()).as_scalar(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Scalar(10.0).to_string(), "10");
        assert_eq!(Value::Text("hello".into()).to_string(), "hello");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Empty.to_string(), "");
    }
}
