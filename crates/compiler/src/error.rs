//! Compile-time errors.

use thiserror::Error;

/// Malformed source text. Compilation aborts before any program is
/// installed; the position points at the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    /// 1-based source line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}
