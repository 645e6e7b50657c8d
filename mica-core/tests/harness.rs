use mica_core::compiler::{check_source, compile_source, CheckedSource};
use mica_core::diagnostic::Severity;
use mica_core::{CompilationArtifact, CompileOptions, CoreError};

/// Compile a source snippet all the way to assembly.
pub fn compile_src(src: &str) -> Result<CompilationArtifact, CoreError> {
    compile_source(src, "<test>", CompileOptions::default())
}

/// Compile and unwrap; panics with the diagnostics on failure.
pub fn assemble(src: &str) -> String {
    match compile_src(src) {
        Ok(artifact) => artifact.assembly,
        Err(CoreError::Diagnostics(diags)) => {
            panic!("expected successful compilation, got: {diags:?}")
        }
        Err(e) => panic!("expected successful compilation, got: {e}"),
    }
}

/// Lex, parse and analyze without generating code.
pub fn check(src: &str) -> CheckedSource {
    check_source(src, "<test>")
}

/// Error-severity diagnostic messages for a snippet.
pub fn error_messages(src: &str) -> Vec<String> {
    check(src)
        .diagnostics
        .into_iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message)
        .collect()
}

pub fn assert_accepts(src: &str) {
    let errors = error_messages(src);
    assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
}

pub fn assert_rejects(src: &str, expected_substring: &str) {
    let errors = error_messages(src);
    assert!(
        errors.iter().any(|m| m.contains(expected_substring)),
        "expected an error containing {expected_substring:?}, got: {errors:?}"
    );
}

/// Assert that `haystack` contains the given lines in order (not
/// necessarily adjacent). Instruction lines are matched trimmed.
pub fn assert_contains_in_order(haystack: &str, needles: &[&str]) {
    let mut lines = haystack.lines().map(str::trim);
    for needle in needles {
        assert!(
            lines.any(|line| line == *needle),
            "expected {needle:?} (in order) in:\n{haystack}"
        );
    }
}
