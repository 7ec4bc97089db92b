//! The executor: owner of one live connection.
//!
//! Runs one statement at a time, using the classifier to choose between the
//! row-streaming path and the status/row-count path. Executors are created
//! whole and discarded whole; they are never mutated in place.

use std::time::Instant;

use tracing::{debug, error, info};

use crate::classify;
use crate::db::{ConnSettings, Connector};
use crate::db::{Conn, ExecResult, QueryResult, StatementResult};
use crate::error::Result;

pub struct Executor {
    conn: Box<dyn Conn>,
    settings: ConnSettings,
}

impl Executor {
    /// Opens a connection through the connector and verifies liveness.
    /// A connection that opens but fails the ping is a connect failure.
    pub async fn connect(connector: &dyn Connector) -> Result<Self> {
        let mut conn = connector.connect().await?;
        if let Err(e) = conn.ping().await {
            error!(error = %e, "connection ping failed");
            conn.close().await;
            return Err(e);
        }
        let settings = conn.settings().clone();
        Ok(Self { conn, settings })
    }

    /// Runs a statement, routing by classification. Invalid statements are
    /// not pre-filtered; the server's own parse error surfaces.
    pub async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        if classify::is_read(sql) {
            self.query(sql).await.map(StatementResult::Query)
        } else {
            self.exec(sql).await.map(StatementResult::Exec)
        }
    }

    /// Row-streaming path (SELECT, SHOW, RETURNING, ...).
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing query");
        let start = Instant::now();
        let (columns, source) = self.conn.query(sql).await.map_err(|e| {
            error!(error = %e, sql, "query failed");
            e
        })?;
        let execution_time = start.elapsed();
        info!(
            duration_ms = execution_time.as_millis() as u64,
            columns = columns.len(),
            "query ready to stream"
        );
        Ok(QueryResult::new(columns, source, start, execution_time))
    }

    /// Status path (INSERT, UPDATE, DELETE, DDL, ...).
    async fn exec(&mut self, sql: &str) -> Result<ExecResult> {
        debug!(sql, "executing command");
        let start = Instant::now();
        let tag = self.conn.exec(sql).await.map_err(|e| {
            error!(error = %e, sql, "command failed");
            e
        })?;
        let duration = start.elapsed();
        info!(
            duration_ms = duration.as_millis() as u64,
            rows_affected = tag.rows_affected(),
            status = %tag,
            "command completed"
        );
        Ok(ExecResult::new(tag, duration))
    }

    /// Liveness check on the underlying connection.
    pub async fn ping(&mut self) -> Result<()> {
        self.conn.ping().await
    }

    /// Releases the connection.
    pub async fn close(mut self) {
        self.conn.close().await;
    }

    /// The settings negotiated for this connection.
    pub fn settings(&self) -> &ConnSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{MockConn, MockConnector};
    use crate::db::{CommandTag, Value};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_query_path_streams_rows() {
        let mut conn = MockConn::new();
        conn.push_query(
            vec!["id", "name", "age"],
            vec![
                vec![Value::Int(1), Value::from("name1"), Value::Int(30)],
                vec![Value::Int(2), Value::from("name2"), Value::Int(25)],
            ],
        );
        let connector = MockConnector::with_conn(conn);
        let mut executor = Executor::connect(&connector).await.unwrap();

        let result = executor.execute("select * from users").await.unwrap();
        let mut query = match result {
            StatementResult::Query(q) => q,
            StatementResult::Exec(_) => panic!("expected query result"),
        };
        assert_eq!(query.columns(), &["id", "name", "age"]);
        assert_eq!(
            query.next().await.unwrap(),
            Some(vec![Value::Int(1), Value::from("name1"), Value::Int(30)])
        );
        assert_eq!(
            query.next().await.unwrap(),
            Some(vec![Value::Int(2), Value::from("name2"), Value::Int(25)])
        );
        assert_eq!(query.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exec_path_returns_tag() {
        let mut conn = MockConn::new();
        conn.push_exec(CommandTag::new("DELETE 1"));
        let connector = MockConnector::with_conn(conn);
        let mut executor = Executor::connect(&connector).await.unwrap();

        let result = executor
            .execute("delete from users where id = 1")
            .await
            .unwrap();
        match result {
            StatementResult::Exec(exec) => {
                assert_eq!(exec.rows_affected, 1);
                assert_eq!(exec.status_tag, "DELETE 1");
            }
            StatementResult::Query(_) => panic!("expected exec result"),
        }
    }

    #[tokio::test]
    async fn test_failed_ping_is_connect_failure() {
        let mut conn = MockConn::new();
        conn.fail_ping();
        let close_count = conn.close_count();
        let connector = MockConnector::with_conn(conn);

        assert!(Executor::connect(&connector).await.is_err());
        // The half-open connection is released.
        assert_eq!(close_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_statement_takes_exec_path() {
        // The executor does not pre-filter invalid SQL; the connection's own
        // error surfaces.
        let connector = MockConnector::with_conn(MockConn::new());
        let mut executor = Executor::connect(&connector).await.unwrap();
        let err = executor.execute("definitely not sql").await.unwrap_err();
        assert!(err.to_string().contains("unexpected"));
    }
}
