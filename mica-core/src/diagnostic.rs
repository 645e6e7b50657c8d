//! Diagnostics for the Mica compiler.
//!
//! Every stage reports problems as `Diagnostic` values with a precise
//! source position and, where the lexer's file tracking can supply it,
//! the origin file of the offending line. Stages accumulate
//! diagnostics instead of aborting so a single run can surface
//! several independent problems.

use crate::span::Pos;

/// Severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub pos: Pos,
    /// Origin file of the line the position points into, where the
    /// lexer's line→file map could resolve it.
    pub file: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic at a position.
    pub fn error(message: impl Into<String>, pos: Pos) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            pos,
            file: None,
        }
    }

    /// Create a new warning diagnostic at a position.
    pub fn warning(message: impl Into<String>, pos: Pos) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            pos,
            file: None,
        }
    }

    /// Attach the origin file this diagnostic points into.
    pub fn with_file(mut self, file: impl Into<String>) -> Diagnostic {
        self.file = Some(file.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Returns true if any diagnostic in the list is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
