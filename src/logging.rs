//! Logging configuration.
//!
//! Logs go to a file so they never corrupt the interactive terminal; if the
//! file cannot be opened, logging falls back to stderr. The debug flag
//! lowers the level filter to debug.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initializes logging for the process.
pub fn init(debug: bool, log_path: &Path) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(parent) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("warning: could not create log directory {}: {e}", parent.display());
            return init_stderr(filter);
        }
    }

    let file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("warning: could not open log file {}: {e}", log_path.display());
            return init_stderr(filter);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .init();
}

fn init_stderr(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
