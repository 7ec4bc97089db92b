//! Error types for pgline.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Main error type for pgline operations.
#[derive(Error, Debug)]
pub enum PglineError {
    /// The connection target string could not be parsed.
    #[error("malformed connection target: {0}")]
    MalformedTarget(String),

    /// Errors reported by the database driver, surfaced unchanged so the
    /// SQLSTATE code stays inspectable.
    #[error(transparent)]
    Driver(#[from] tokio_postgres::Error),

    /// Authentication failures raised by non-driver connectors (mocks).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connect failures raised by non-driver connectors (mocks).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Statement failures raised by non-driver connections (mocks).
    #[error("execution failed: {0}")]
    Execution(String),

    /// An operation that requires a live connection was called without one.
    #[error("not connected to any database")]
    NotConnected,

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// Degradable resource errors (history file, pager subprocess).
    #[error("resource error: {0}")]
    Resource(String),

    /// I/O errors from the terminal or output path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PglineError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a resource error with the given message.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Returns true if this error is a server-reported invalid credential,
    /// the only failure that arms the single password-retry path.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Driver(e) => e.code() == Some(&SqlState::INVALID_PASSWORD),
            _ => false,
        }
    }
}

/// Result type alias using PglineError.
pub type Result<T> = std::result::Result<T, PglineError>;
