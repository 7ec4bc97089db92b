//! Paged output.
//!
//! When both stdin and stdout are terminals, output goes through `$PAGER`
//! (default `less`); otherwise, or when the pager cannot be spawned, output
//! falls straight through to stdout. The pager's exit is awaited tolerating
//! interrupted-system-call errors.

use std::io::{self, ErrorKind, Write};
use std::process::{Child, Command, Stdio};

use tracing::debug;

/// Where paged output currently goes.
enum Target {
    Pager(Child),
    Stdout(io::Stdout),
}

/// A writer that routes output through the pager when appropriate.
pub struct Pager {
    target: Target,
}

impl Pager {
    /// Opens the output path for one result. Never fails: every problem
    /// degrades to direct stdout.
    pub fn open() -> Self {
        if !atty::is(atty::Stream::Stdout) || !atty::is(atty::Stream::Stdin) {
            return Self::stdout();
        }

        let command = pager_command();
        let spawned = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();
        match spawned {
            Ok(child) => Self {
                target: Target::Pager(child),
            },
            Err(e) => {
                debug!(pager = %command[0], error = %e, "could not spawn pager, writing directly");
                Self::stdout()
            }
        }
    }

    fn stdout() -> Self {
        Self {
            target: Target::Stdout(io::stdout()),
        }
    }

    /// Flushes remaining output and waits for the pager to exit, retrying on
    /// interrupted waits.
    pub fn close(mut self) -> io::Result<()> {
        match self.target {
            Target::Stdout(ref mut out) => out.flush(),
            Target::Pager(mut child) => {
                // Dropping stdin signals end of input to the pager.
                drop(child.stdin.take());
                loop {
                    match child.wait() {
                        Ok(_) => return Ok(()),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }
}

impl Write for Pager {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.target {
            Target::Stdout(out) => out.write(buf),
            Target::Pager(child) => match child.stdin.as_mut() {
                Some(stdin) => stdin.write(buf),
                None => Ok(buf.len()),
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Stdout(out) => out.flush(),
            Target::Pager(child) => match child.stdin.as_mut() {
                Some(stdin) => stdin.flush(),
                None => Ok(()),
            },
        }
    }
}

/// Resolves the pager command line: `$PAGER` (shell-split), else `less` with
/// a sensible default `LESS` setting.
fn pager_command() -> Vec<String> {
    if let Ok(pager) = std::env::var("PAGER") {
        if let Some(parts) = shlex::split(&pager) {
            if !parts.is_empty() {
                return parts;
            }
        }
    }

    if std::env::var_os("LESS").is_none() {
        std::env::set_var("LESS", "-SRFX");
    }
    vec!["less".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pager_command_splits_pager_env() {
        // shlex splitting respects quoting.
        let parts = shlex::split("less -R '+G'").unwrap();
        assert_eq!(parts, vec!["less", "-R", "+G"]);
    }

    #[test]
    fn test_stdout_target_writes_and_closes() {
        let mut pager = Pager::stdout();
        pager.write_all(b"").unwrap();
        pager.flush().unwrap();
        pager.close().unwrap();
    }

    #[test]
    fn test_default_pager_is_less() {
        // With PAGER unset the default is less; the LESS default is set as a
        // side effect.
        if std::env::var_os("PAGER").is_none() {
            assert_eq!(pager_command()[0], "less");
        }
    }
}
