use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mica_core::{
    compile_source,
    compiler::check_source,
    diagnostic::{Diagnostic, Severity},
    preprocessor::Preprocessor,
    CompileOptions, CoreError,
};

/// Whole-program compiler for the Mica language.
#[derive(Parser, Debug)]
#[command(name = "micac", version, about, long_about = None)]
struct Cli {
    /// Input source file.
    input: PathBuf,

    /// Output assembly file.
    output: PathBuf,

    /// Emit stage progress to stderr.
    #[arg(long)]
    verbose: bool,

    /// Print the symbol table after analysis.
    #[arg(long)]
    dump_symbols: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read input file {}", cli.input.display()))?;

    let working_dir = cli
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ".".into());
    let entry = cli.input.display().to_string();

    let mut preprocessor = Preprocessor::new(working_dir);
    let processed = match preprocessor.process(&source, &entry) {
        Ok(buffer) => buffer,
        Err(e) => return Err(anyhow::anyhow!(e.to_string()).context("preprocessing failed")),
    };

    if cli.dump_symbols {
        let checked = check_source(&processed, &entry);
        eprintln!("=== Symbol Table ===");
        eprint!("{}", checked.table.dump());
    }

    let options = CompileOptions {
        verbose: cli.verbose,
    };
    let artifact = match compile_source(&processed, &entry, options) {
        Ok(artifact) => artifact,
        Err(CoreError::Diagnostics(diags)) => {
            render_diagnostics(&diags, &processed);
            return Err(anyhow::anyhow!("compilation failed"));
        }
        Err(e) => return Err(anyhow::anyhow!(e.to_string())),
    };

    render_diagnostics(&artifact.warnings, &processed);

    write_output(&cli.output, artifact.assembly.as_bytes())?;
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

/// Render diagnostics with the offending source line and a caret
/// marking the column.
fn render_diagnostics(diags: &[Diagnostic], source: &str) {
    for d in diags {
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{severity}: {}", d.message);

        let file = d.file.as_deref().unwrap_or("<unknown>");
        eprintln!(" --> {file}:{}:{}", d.pos.line, d.pos.column);

        if d.pos.line >= 1 {
            if let Some(line) = source.lines().nth(d.pos.line as usize - 1) {
                eprintln!("  {:>4} | {line}", d.pos.line);
                let caret_pad = " ".repeat(d.pos.column.saturating_sub(1) as usize);
                eprintln!("       | {caret_pad}^");
            }
        }
        eprintln!();
    }
}
