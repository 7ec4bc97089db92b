//! Database layer: connection traits, connector, executor, and results.
//!
//! The traits here form the seam between the execution pipeline and the
//! PostgreSQL driver, so the pipeline can be exercised against scripted
//! mock connections.

mod connector;
mod executor;
pub mod mock;
mod postgres;
mod result;
mod types;

pub use connector::{ConnSettings, ConnectionTarget, Connector, PgConnector};
pub use executor::Executor;
pub use result::{ExecResult, QueryResult, ResultDuration, StatementResult};
pub use types::{CommandTag, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// One live server connection.
///
/// Implementations own the connection and the settings actually negotiated
/// with the server (which may differ from the caller's input once a URI/DSN
/// has been parsed).
#[async_trait]
pub trait Conn: Send {
    /// Runs a row-returning statement. Returns the fixed column names and a
    /// forward-only row source; the columns are known before the first row.
    async fn query(&mut self, sql: &str) -> Result<(Vec<String>, Box<dyn RowSource>)>;

    /// Runs a statement for its side effects, returning the completion tag.
    async fn exec(&mut self, sql: &str) -> Result<CommandTag>;

    /// Liveness check; a connection that opens but fails this is treated as
    /// a connect failure.
    async fn ping(&mut self) -> Result<()>;

    /// Releases the connection. Safe to call once; the connection is unusable
    /// afterwards.
    async fn close(&mut self);

    /// The resolved connection settings.
    fn settings(&self) -> &ConnSettings;
}

/// A forward-only, single-pass source of rows backing a `QueryResult`.
#[async_trait]
pub trait RowSource: Send {
    /// Pulls the next row, or `None` at end of stream. May block on network
    /// I/O. After an error the source is spent.
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// The completion tag for the statement; meaningful once the stream has
    /// been drained.
    fn command_tag(&self) -> CommandTag;

    /// Releases driver resources. Idempotent.
    fn close(&mut self);
}
