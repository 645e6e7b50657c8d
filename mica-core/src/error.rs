//! Core error type for the Mica language toolchain.
//!
//! Language-level problems are expressed as `Diagnostic` values;
//! `CoreError` is the outer wrapper returned by the pipeline entry
//! points. High-level tools (CLI, editor integrations) are expected to
//! handle I/O on their side and render `Diagnostic` lists themselves.

use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more language-level errors with position information.
    #[error("{}", first_message(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// A preprocessing failure (missing file, malformed import,
    /// circular import). Fatal: the pipeline never starts.
    #[error("preprocessing error: {0}")]
    Preprocess(String),

    /// A code generation failure on an analyzed program. Should not
    /// occur for programs the analyzer accepted.
    #[error("code generation error: {0}")]
    Codegen(String),

    /// A bug in the compiler or an unexpected unreachable situation.
    #[error("internal compiler error: {0}")]
    Internal(&'static str),
}

impl CoreError {
    /// Construct a CoreError from a single Diagnostic.
    pub fn from_diagnostic(diagnostic: Diagnostic) -> CoreError {
        CoreError::Diagnostics(vec![diagnostic])
    }

    /// Construct a CoreError from multiple Diagnostics.
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> CoreError {
        CoreError::Diagnostics(diagnostics)
    }
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.first() {
        Some(d) => d.message.clone(),
        None => "diagnostic error (no messages)".to_string(),
    }
}
