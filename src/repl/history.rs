//! Input-line history with bounded, append-only persistence.
//!
//! The history keeps at most 1000 lines, evicting the oldest first. Only
//! lines added during the current session are written back on close; lines
//! loaded from a prior session are never re-written.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use tracing::{debug, error};

use crate::config;

/// Maximum number of history lines kept in memory and on disk.
pub const MAX_HISTORY_LINES: usize = 1000;

pub struct History {
    path: PathBuf,
    entries: Vec<String>,
    load_count: usize,
}

impl History {
    /// Creates a history bound to the given file path; the config sentinel
    /// selects the default path in the home directory.
    pub fn new(history_path: &str) -> Self {
        let path = if history_path.is_empty() || history_path == config::DEFAULT_SENTINEL {
            default_history_path()
        } else {
            PathBuf::from(history_path)
        };
        Self {
            path,
            entries: Vec::new(),
            load_count: 0,
        }
    }

    /// Loads history from the file. A missing or unreadable file degrades to
    /// an empty history; it never fails the session.
    pub fn load(&mut self) {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "could not open history file");
                return;
            }
        };
        match load_from(BufReader::new(file), MAX_HISTORY_LINES) {
            Ok(entries) => {
                self.load_count = entries.len();
                debug!(entries = entries.len(), "history loaded");
                self.entries = entries;
            }
            Err(e) => {
                error!(error = %e, "failed to load history");
                self.entries = Vec::new();
                self.load_count = 0;
            }
        }
    }

    /// Appends one input line.
    pub fn append(&mut self, line: &str) {
        self.entries.push(line.to_string());
    }

    /// The current entries, most recent last.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Persists the lines appended since `load`. Failures are logged, never
    /// fatal.
    pub fn save(&self) {
        let new_lines = &self.entries[self.load_count.min(self.entries.len())..];
        if new_lines.is_empty() {
            return;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path);
        let mut file = match file {
            Ok(file) => file,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to open history file for writing");
                return;
            }
        };

        if let Err(e) = file.write_all((new_lines.join("\n") + "\n").as_bytes()) {
            error!(error = %e, "failed to write history");
        } else {
            debug!(new_entries = new_lines.len(), "history saved");
        }
    }
}

/// Reads lines from a source, keeping only the last `max_lines` (oldest
/// evicted first).
pub fn load_from<R: Read>(reader: BufReader<R>, max_lines: usize) -> std::io::Result<Vec<String>> {
    let mut entries: Vec<String> = Vec::new();
    for line in reader.lines() {
        entries.push(line?);
        if entries.len() > max_lines {
            entries.remove(0);
        }
    }
    Ok(entries)
}

fn default_history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pgline_history")
}
