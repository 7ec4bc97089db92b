//! Statement results: streaming query results and exec status results.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::db::types::{CommandTag, Row};
use crate::db::RowSource;
use crate::error::Result;

/// The outcome of executing one statement, tagged by its classification.
pub enum StatementResult {
    /// A row-returning statement with a streaming cursor.
    Query(QueryResult),
    /// A side-effecting statement with a completion tag.
    Exec(ExecResult),
}

impl fmt::Debug for StatementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementResult::Query(q) => f.debug_tuple("Query").field(q).finish(),
            StatementResult::Exec(e) => f.debug_tuple("Exec").field(e).finish(),
        }
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.columns)
            .field("closed", &self.closed)
            .field("stream_done", &self.stream_done)
            .field("rows_streamed", &self.rows_streamed)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Timing metrics for a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultDuration {
    /// Time until the result was ready to stream.
    pub execution_time: Duration,
    /// Client-observed latency to the first row.
    pub time_to_first_row: Duration,
    /// Time to drain the remaining rows after the first.
    pub stream_duration: Duration,
}

/// Result of a side-effecting statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: i64,
    pub status_tag: String,
    pub duration: ResultDuration,
}

impl ExecResult {
    pub fn new(tag: CommandTag, execution_time: Duration) -> Self {
        Self {
            rows_affected: tag.rows_affected(),
            status_tag: tag.to_string(),
            duration: ResultDuration {
                execution_time,
                ..Default::default()
            },
        }
    }
}

/// Result of a row-returning statement.
///
/// The columns are fixed at construction and never change during iteration.
/// The row cursor is forward-only and single-pass: once closed (explicitly,
/// on error, or on exhaustion) every subsequent `next` yields end-of-stream.
pub struct QueryResult {
    columns: Vec<String>,
    source: Box<dyn RowSource>,
    closed: bool,
    stream_done: bool,
    rows_streamed: u64,
    started_at: Instant,
    first_row_at: Option<Instant>,
    duration: ResultDuration,
}

impl QueryResult {
    /// Wraps a row source. `started_at` is the instant the statement was
    /// issued; `execution_time` is the latency until the source was ready.
    pub fn new(
        columns: Vec<String>,
        source: Box<dyn RowSource>,
        started_at: Instant,
        execution_time: Duration,
    ) -> Self {
        Self {
            columns,
            source,
            closed: false,
            stream_done: false,
            rows_streamed: 0,
            started_at,
            first_row_at: None,
            duration: ResultDuration {
                execution_time,
                ..Default::default()
            },
        }
    }

    /// The column names of the result set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows streamed so far.
    pub fn rows_streamed(&self) -> u64 {
        self.rows_streamed
    }

    /// Pulls the next row, or `None` at end of stream.
    ///
    /// The first row stamps the time-to-first-row metric; the first
    /// end-of-stream finalizes the stream duration exactly once. A read error
    /// closes the stream and is surfaced once; afterwards every call returns
    /// end-of-stream.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        match self.source.next_row().await {
            Ok(Some(row)) => {
                self.rows_streamed += 1;
                if self.rows_streamed == 1 {
                    let now = Instant::now();
                    self.first_row_at = Some(now);
                    self.duration.time_to_first_row = now - self.started_at;
                }
                Ok(Some(row))
            }
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(e) => {
                self.closed = true;
                self.source.close();
                debug!(error = %e, "row stream failed");
                Err(e)
            }
        }
    }

    /// The statement completion tag; meaningful once the stream is drained.
    pub fn status_tag(&self) -> String {
        self.source.command_tag().to_string()
    }

    /// Timing metrics. Stream-related fields are final once the stream has
    /// been drained.
    pub fn duration(&self) -> ResultDuration {
        self.duration
    }

    /// Closes the cursor. Safe to call multiple times and after exhaustion.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
    }

    fn finish(&mut self) {
        self.closed = true;
        self.source.close();
        if self.stream_done {
            return;
        }
        self.stream_done = true;
        let end = Instant::now();
        if self.rows_streamed == 0 {
            // No first-row event: both metrics collapse to the total latency.
            let elapsed = end - self.started_at;
            self.duration.execution_time = elapsed;
            self.duration.time_to_first_row = elapsed;
            self.duration.stream_duration = Duration::ZERO;
        } else if let Some(first_row_at) = self.first_row_at {
            self.duration.stream_duration = end - first_row_at;
        }
    }
}
