//! Pipeline orchestration.
//!
//! Runs the stages in order (preprocess, lex, parse, analyze,
//! generate), merging diagnostics across stages. Every stage runs to
//! completion before the next begins; a parse failure still yields a
//! partial AST that the analyzer walks, but code generation only runs
//! on an error-free program.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::codegen;
use crate::diagnostic::{has_errors, Diagnostic};
use crate::error::CoreError;
use crate::lexer::{self, Token};
use crate::log;
use crate::parser;
use crate::preprocessor::Preprocessor;
use crate::semantic::{self, Analysis};
use crate::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Emit stage progress to stderr.
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct CompilationArtifact {
    pub assembly: String,
    /// Non-fatal diagnostics (warnings) from an otherwise successful
    /// compilation.
    pub warnings: Vec<Diagnostic>,
}

/// Compile an already-preprocessed buffer. `entry_file` names the
/// buffer's own file for origin tracking and diagnostics.
pub fn compile_source(
    source: &str,
    entry_file: &str,
    options: CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    log::set_verbose(options.verbose);

    log::stage("lexing");
    let lex = lexer::lex(source, entry_file);
    let line_files = lex.line_files.clone();

    log::stage("parsing");
    let parse = parser::parse(lex.tokens);

    log::stage("analyzing");
    let analysis = semantic::analyze(&parse.program);

    let mut diagnostics = parse.diagnostics;
    diagnostics.extend(analysis.diagnostics);
    attach_origin_files(&mut diagnostics, &line_files);
    if has_errors(&diagnostics) {
        return Err(CoreError::from_diagnostics(diagnostics));
    }

    log::stage("generating code");
    let assembly = codegen::generate(&parse.program, &analysis.table)?;

    Ok(CompilationArtifact {
        assembly,
        warnings: diagnostics,
    })
}

/// Read, preprocess and compile a file from disk.
pub fn compile_file(
    input: impl AsRef<Path>,
    options: CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let input = input.as_ref();
    let source = fs::read_to_string(input).map_err(|_| {
        CoreError::Preprocess(format!("Could not open file: {}", input.display()))
    })?;

    let working_dir = input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ".".into());
    let mut preprocessor = Preprocessor::new(working_dir);
    let entry = input.display().to_string();
    let processed = preprocessor.process(&source, &entry)?;

    compile_source(&processed, &entry, options)
}

/// A parsed and analyzed buffer with everything the editor queries
/// need: the token stream, the program, the finished symbol table and
/// all diagnostics. Never fails: broken input simply carries its
/// diagnostics.
#[derive(Debug)]
pub struct CheckedSource {
    pub tokens: Vec<Token>,
    pub program: crate::ast::Program,
    pub table: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn check_source(source: &str, entry_file: &str) -> CheckedSource {
    let lex = lexer::lex(source, entry_file);
    let tokens = lex.tokens.clone();
    let line_files = lex.line_files.clone();
    let parse = parser::parse(lex.tokens);
    let Analysis {
        table,
        diagnostics: semantic_diagnostics,
    } = semantic::analyze(&parse.program);

    let mut diagnostics = parse.diagnostics;
    diagnostics.extend(semantic_diagnostics);
    attach_origin_files(&mut diagnostics, &line_files);

    CheckedSource {
        tokens,
        program: parse.program,
        table,
        diagnostics,
    }
}

/// Fill in the origin file for diagnostics that lack one, using the
/// lexer's line→file map (most recent binding at or before the line).
fn attach_origin_files(diagnostics: &mut [Diagnostic], line_files: &BTreeMap<u32, String>) {
    for d in diagnostics {
        if d.file.is_none() && d.pos.line >= 1 {
            if let Some((_, file)) = line_files.range(..=d.pos.line).next_back() {
                d.file = Some(file.clone());
            }
        }
    }
}
