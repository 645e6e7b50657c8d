//! Textual import inliner.
//!
//! Runs before the lexer: every `import "path";` line is replaced by
//! the transitively preprocessed contents of the imported file,
//! wrapped in file-boundary markers the lexer's origin tracker
//! consumes, and prefixed with a synthetic layout that gives the
//! import a stable, diagnosable name. Imports resolve relative to the
//! file that contains them and recurse depth-first; revisiting a file
//! that is still being inlined is a circular-import error.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Marker lines bracketing each inlined file. The lexer matches these
/// exactly to maintain its line→origin-file map.
pub const START_MARKER: &str = "// Start of imported file: ";
pub const END_MARKER: &str = "// End of imported file: ";

/// Recursive import inliner over a working directory.
#[derive(Debug)]
pub struct Preprocessor {
    working_dir: PathBuf,
    /// Files whose subtree is still being inlined; hitting one again
    /// is a cycle.
    processing: BTreeSet<PathBuf>,
    /// Files inlined once already; further imports of them are
    /// skipped instead of duplicated.
    processed: BTreeSet<PathBuf>,
}

impl Preprocessor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Preprocessor {
        Preprocessor {
            working_dir: working_dir.into(),
            processing: BTreeSet::new(),
            processed: BTreeSet::new(),
        }
    }

    /// Produce a single flat buffer with every transitive import
    /// inlined in discovery order. `main_file` is the path of the
    /// buffer's own file, used to resolve its imports.
    pub fn process(&mut self, source: &str, main_file: &str) -> Result<String, CoreError> {
        self.processing.clear();
        self.processed.clear();
        self.process_imports(source, Path::new(main_file))
    }

    fn process_imports(&mut self, source: &str, current_file: &Path) -> Result<String, CoreError> {
        let current_path = absolute(current_file);
        let current_dir = current_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.working_dir.clone());

        self.processing.insert(current_path.clone());

        let mut result = String::new();
        for line in source.lines() {
            if is_import_statement(line) {
                let import_spec = extract_filename(line)?;
                let import_path = absolute(&current_dir.join(&import_spec));

                if self.processing.contains(&import_path) {
                    return Err(CoreError::Preprocess(format!(
                        "Circular import detected: {import_spec}"
                    )));
                }
                if !self.processed.insert(import_path.clone()) {
                    // Already inlined elsewhere; once is enough.
                    continue;
                }

                let imported = fs::read_to_string(&import_path).map_err(|_| {
                    CoreError::Preprocess(format!(
                        "Could not open file: {}",
                        import_path.display()
                    ))
                })?;
                let inlined = self.process_imports(&imported, &import_path)?;
                result.push_str(&wrap_import(&inlined, &import_spec, &import_path));
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        self.processing.remove(&current_path);
        Ok(result)
    }
}

/// Wrap inlined code in marker comments plus a synthetic layout whose
/// name is the sanitized import path, so the import itself is
/// reachable under a stable name.
fn wrap_import(code: &str, import_spec: &str, absolute_path: &Path) -> String {
    let ns = sanitize_identifier(import_spec);
    let path = absolute_path.display();

    let mut out = String::new();
    out.push_str(&format!("{START_MARKER}{path}\n"));
    out.push_str(&format!("layout __import_{ns} {{\n"));
    out.push_str("    int _dummy;\n");
    out.push_str("};\n\n");
    out.push_str(code);
    out.push('\n');
    out.push_str(&format!("{END_MARKER}{path}"));
    out
}

/// Non-alphanumeric characters become underscores.
fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn is_import_statement(line: &str) -> bool {
    line.split_whitespace().next() == Some("import")
}

fn extract_filename(import_line: &str) -> Result<String, CoreError> {
    let start = import_line.find('"').ok_or_else(|| {
        CoreError::Preprocess("Invalid import statement: missing opening quote".to_string())
    })?;
    let rest = &import_line[start + 1..];
    let end = rest.find('"').ok_or_else(|| {
        CoreError::Preprocess("Invalid import statement: missing closing quote".to_string())
    })?;
    Ok(rest[..end].to_string())
}

fn absolute(path: &Path) -> PathBuf {
    // canonicalize also resolves symlinks; fall back to a plain
    // absolute join when the file does not exist yet so the error
    // message still names the path we tried.
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|d| d.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
