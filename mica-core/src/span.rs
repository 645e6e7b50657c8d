//! Source code position utilities.
//!
//! The compiler runs over a single preprocessed buffer, so positions
//! are one-based (line, column) pairs; the file a line originally came
//! from is tracked separately by the lexer's origin map and attached
//! to tokens and diagnostics as needed.

use core::fmt;

/// A one-based source position.
///
/// Line 1, column 1 is the first character of the preprocessed buffer.
/// Every token, AST node and diagnostic carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Pos {
        Pos { line, column }
    }

    /// A placeholder position for situations where no precise source
    /// location is available (synthetic nodes, internal errors).
    pub fn dummy() -> Pos {
        Pos { line: 0, column: 0 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
