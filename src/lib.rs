//! pgline - an interactive PostgreSQL command-line client.
//!
//! Exposes the library modules so integration tests can exercise the
//! session and execution pipeline without going through the binary.

pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod repl;
pub mod session;
pub mod special;
