//! Scripted mock connections for testing.
//!
//! `MockConn` serves pre-loaded query results and completion tags,
//! `MockConnector` scripts a sequence of connect outcomes (auth failure,
//! refused, success), and `MockRowSource` backs streaming query results.
//! Used by the unit tests here and the integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::db::{CommandTag, Conn, ConnSettings, Connector, Row, RowSource};
use crate::error::{PglineError, Result};

/// A row source serving scripted rows, optionally failing after them.
pub struct MockRowSource {
    rows: VecDeque<Row>,
    verb: String,
    served: u64,
    fail_message: Option<String>,
    closed: bool,
}

impl MockRowSource {
    pub fn new(rows: Vec<Row>, verb: &str) -> Self {
        Self {
            rows: rows.into(),
            verb: verb.to_string(),
            served: 0,
            fail_message: None,
            closed: false,
        }
    }

    /// Serves the given rows, then fails with the message instead of ending
    /// the stream.
    pub fn failing_after(rows: Vec<Row>, message: &str) -> Self {
        Self {
            fail_message: Some(message.to_string()),
            ..Self::new(rows, "SELECT")
        }
    }
}

#[async_trait]
impl RowSource for MockRowSource {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        match self.rows.pop_front() {
            Some(row) => {
                self.served += 1;
                Ok(Some(row))
            }
            None => {
                self.closed = true;
                match self.fail_message.take() {
                    Some(message) => Err(PglineError::Execution(message)),
                    None => Ok(None),
                }
            }
        }
    }

    fn command_tag(&self) -> CommandTag {
        CommandTag::from_verb(&self.verb, self.served)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// A connection serving scripted query results and completion tags in order.
pub struct MockConn {
    settings: ConnSettings,
    queries: VecDeque<(Vec<String>, Vec<Row>)>,
    execs: VecDeque<CommandTag>,
    ping_ok: bool,
    close_count: Arc<AtomicUsize>,
}

impl MockConn {
    pub fn new() -> Self {
        Self {
            settings: ConnSettings {
                host: "localhost".to_string(),
                port: Some(5432),
                user: "tester".to_string(),
                password: "pw".to_string(),
                database: "testdb".to_string(),
            },
            queries: VecDeque::new(),
            execs: VecDeque::new(),
            ping_ok: true,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_settings(mut self, settings: ConnSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Queues a query result: column names plus rows.
    pub fn push_query(&mut self, columns: Vec<&str>, rows: Vec<Row>) {
        self.queries
            .push_back((columns.into_iter().map(String::from).collect(), rows));
    }

    /// Queues an exec completion tag.
    pub fn push_exec(&mut self, tag: CommandTag) {
        self.execs.push_back(tag);
    }

    /// Makes the liveness check fail.
    pub fn fail_ping(&mut self) {
        self.ping_ok = false;
    }

    /// Shared counter of how many times this connection was closed.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }
}

impl Default for MockConn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Conn for MockConn {
    async fn query(&mut self, sql: &str) -> Result<(Vec<String>, Box<dyn RowSource>)> {
        match self.queries.pop_front() {
            Some((columns, rows)) => {
                let verb = sql.split_whitespace().next().unwrap_or("SELECT");
                let source = MockRowSource::new(rows, &verb.to_uppercase());
                Ok((columns, Box::new(source)))
            }
            None => Err(PglineError::Execution(format!("unexpected query: {sql}"))),
        }
    }

    async fn exec(&mut self, sql: &str) -> Result<CommandTag> {
        self.execs
            .pop_front()
            .ok_or_else(|| PglineError::Execution(format!("unexpected command: {sql}")))
    }

    async fn ping(&mut self) -> Result<()> {
        if self.ping_ok {
            Ok(())
        } else {
            Err(PglineError::Connect("ping failed".to_string()))
        }
    }

    async fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }

    fn settings(&self) -> &ConnSettings {
        &self.settings
    }
}

/// One scripted outcome for a connect attempt.
pub enum ConnectOutcome {
    /// Server-reported invalid credential.
    AuthFailure,
    /// Any other connect failure.
    Refused(String),
    /// A live (mock) connection.
    Success(MockConn),
}

struct ConnectorState {
    outcomes: VecDeque<ConnectOutcome>,
    passwords: Vec<String>,
    attempts: usize,
    databases: Vec<String>,
}

/// A connector replaying scripted connect outcomes.
///
/// Clones share state, so a sibling created by `with_database` draws from the
/// same outcome queue.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new(outcomes: Vec<ConnectOutcome>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectorState {
                outcomes: outcomes.into(),
                passwords: Vec::new(),
                attempts: 0,
                databases: Vec::new(),
            })),
        }
    }

    /// A connector whose next connect yields the given connection.
    pub fn with_conn(conn: MockConn) -> Self {
        Self::new(vec![ConnectOutcome::Success(conn)])
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    /// Passwords passed to `update_password`, in order.
    pub fn passwords_seen(&self) -> Vec<String> {
        self.state.lock().unwrap().passwords.clone()
    }

    /// Databases requested through `with_database`, in order.
    pub fn databases_requested(&self) -> Vec<String> {
        self.state.lock().unwrap().databases.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Conn>> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        match state.outcomes.pop_front() {
            Some(ConnectOutcome::Success(conn)) => Ok(Box::new(conn)),
            Some(ConnectOutcome::AuthFailure) => Err(PglineError::Auth(
                "password authentication failed".to_string(),
            )),
            Some(ConnectOutcome::Refused(message)) => Err(PglineError::Connect(message)),
            None => Err(PglineError::Connect("no scripted outcome".to_string())),
        }
    }

    fn update_password(&mut self, new_password: &str) {
        self.state
            .lock()
            .unwrap()
            .passwords
            .push(new_password.to_string());
    }

    fn with_database(&self, database: &str) -> Box<dyn Connector> {
        self.state
            .lock()
            .unwrap()
            .databases
            .push(database.to_string());
        Box::new(self.clone())
    }
}
