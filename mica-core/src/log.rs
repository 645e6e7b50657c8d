//! Process-wide verbose logging switch.
//!
//! Stage drivers call `stage` to emit progress lines to stderr when
//! the CLI enabled `--verbose`. Nothing here is part of the compiled
//! output.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Emit a stage progress line when verbose output is enabled.
pub fn stage(message: &str) {
    if is_verbose() {
        eprintln!("mica: {message}");
    }
}
