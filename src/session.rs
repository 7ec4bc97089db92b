//! The session: the user-visible handle combining the current executor and
//! current database name, surviving across reconnects.
//!
//! The session exclusively owns its executor. Replacing it (reconnect,
//! database switch) is acquire-new, swap, release-old: on failure nothing is
//! released and the previous connection stays current.

use chrono::Local;
use tracing::{debug, info};

use crate::db::{Connector, Executor, StatementResult, Value};
use crate::error::{PglineError, Result};
use crate::special::{SpecialAction, SpecialRegistry, SpecialResult, TableBlock};

const LIST_DATABASES_SQL: &str = "SELECT datname AS \"Name\" \
     FROM pg_catalog.pg_database WHERE NOT datistemplate ORDER BY 1";

const LIST_TABLES_SQL: &str = "SELECT schemaname AS \"Schema\", tablename AS \"Name\" \
     FROM pg_catalog.pg_tables \
     WHERE schemaname NOT IN ('pg_catalog', 'information_schema') ORDER BY 1, 2";

/// Reads a password from the user. Scripted in tests.
pub trait PasswordPrompt {
    fn read_password(&mut self, user: &str) -> Result<String>;
}

pub struct Session {
    current_db: String,
    executor: Option<Executor>,
    connector: Option<Box<dyn Connector>>,
    never_password_prompt: bool,
    registry: SpecialRegistry,
}

impl Session {
    pub fn new(never_password_prompt: bool, registry: SpecialRegistry) -> Self {
        Self {
            current_db: String::new(),
            executor: None,
            connector: None,
            never_password_prompt,
            registry,
        }
    }

    /// Establishes the initial connection.
    ///
    /// If the first attempt fails with a server-reported invalid credential
    /// and never-prompt mode is off, the user is prompted exactly once, the
    /// password is updated on the same target, and one retry is made. Any
    /// other failure, or a failure while never-prompt is set, is terminal.
    pub async fn connect(
        &mut self,
        mut connector: Box<dyn Connector>,
        user: &str,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<()> {
        let executor = match Executor::connect(connector.as_ref()).await {
            Ok(executor) => executor,
            Err(err) if err.is_auth_failure() && !self.never_password_prompt => {
                debug!("connect failed with invalid credential, prompting once");
                let password = prompt.read_password(user)?;
                connector.update_password(&password);
                Executor::connect(connector.as_ref()).await?
            }
            Err(err) => return Err(err),
        };
        self.current_db = executor.settings().database.clone();
        self.install(executor).await;
        self.connector = Some(connector);
        info!(database = %self.current_db, user = %self.user(), "database connection established");
        Ok(())
    }

    /// Switches to another database: a fresh, non-retrying connect against a
    /// target identical except for the database. Only on success is the
    /// active executor replaced; on failure the previous connection and
    /// database remain active.
    pub async fn change_database(&mut self, name: &str) -> Result<()> {
        if self.executor.is_none() {
            return Err(PglineError::NotConnected);
        }
        let connector = self
            .connector
            .as_ref()
            .ok_or(PglineError::NotConnected)?
            .with_database(name);
        let executor = Executor::connect(connector.as_ref()).await?;
        self.install(executor).await;
        self.connector = Some(connector);
        self.current_db = name.to_string();
        info!(database = name, "database changed");
        Ok(())
    }

    /// Installs a new executor, releasing the previous connection after the
    /// swap.
    async fn install(&mut self, executor: Executor) {
        let old = self.executor.replace(executor);
        if let Some(old) = old {
            old.close().await;
        }
    }

    /// Runs a statement on the active connection.
    pub async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        self.executor
            .as_mut()
            .ok_or(PglineError::NotConnected)?
            .execute(sql)
            .await
    }

    /// Offers a line to the special-command registry. `Ok(None)` means "not a
    /// special command, fall through to SQL".
    pub async fn execute_special(&mut self, line: &str) -> Result<Option<SpecialResult>> {
        let Some(action) = self.registry.recognize(line) else {
            return Ok(None);
        };
        debug!(?action, "special command recognized");
        let result = match action {
            SpecialAction::Exit => SpecialResult::Exit,
            SpecialAction::ChangeDatabase(name) => SpecialResult::ChangeDatabase(name),
            SpecialAction::ConnectionInfo => SpecialResult::ConnectionInfo,
            SpecialAction::Help => SpecialResult::Rows(self.registry.help_block()),
            SpecialAction::ListDatabases => {
                SpecialResult::Rows(self.collect_block(LIST_DATABASES_SQL, None).await?)
            }
            SpecialAction::ListTables => {
                SpecialResult::Rows(self.collect_block(LIST_TABLES_SQL, None).await?)
            }
            SpecialAction::DescribeTable(name) => self.describe_table(&name).await?,
        };
        Ok(Some(result))
    }

    /// Runs a small catalog query and collects it into a renderable block.
    async fn collect_block(&mut self, sql: &str, title: Option<String>) -> Result<TableBlock> {
        match self.execute(sql).await? {
            StatementResult::Query(mut query) => {
                let columns = query.columns().to_vec();
                let mut rows = Vec::new();
                while let Some(row) = query.next().await? {
                    rows.push(row.iter().map(Value::to_display_string).collect());
                }
                Ok(TableBlock {
                    title,
                    columns,
                    rows,
                })
            }
            StatementResult::Exec(_) => Ok(TableBlock {
                title,
                columns: Vec::new(),
                rows: Vec::new(),
            }),
        }
    }

    async fn describe_table(&mut self, name: &str) -> Result<SpecialResult> {
        let quoted = name.replace('\'', "''");
        let columns_sql = format!(
            "SELECT column_name AS \"Column\", data_type AS \"Type\", \
                    is_nullable AS \"Nullable\", column_default AS \"Default\" \
             FROM information_schema.columns \
             WHERE table_name = '{quoted}' ORDER BY ordinal_position"
        );
        let indexes_sql = format!(
            "SELECT indexname AS \"Name\", indexdef AS \"Definition\" \
             FROM pg_catalog.pg_indexes WHERE tablename = '{quoted}' ORDER BY 1"
        );
        let columns = self
            .collect_block(&columns_sql, Some(format!("Table \"{name}\"")))
            .await?;
        let indexes = self
            .collect_block(&indexes_sql, Some("Indexes".to_string()))
            .await?;
        let mut blocks = vec![columns];
        if !indexes.rows.is_empty() {
            blocks.push(indexes);
        }
        Ok(SpecialResult::Tables(blocks))
    }

    /// Substitutes prompt escape tokens in a template.
    ///
    /// Single pass over the template: substituted text is never re-scanned,
    /// so one token's output cannot trigger another substitution.
    pub fn parse_prompt(&self, template: &str) -> String {
        let settings = self.executor.as_ref().map(|e| e.settings());
        let user = settings.map(|s| s.user.as_str()).filter(|u| !u.is_empty());
        let host = settings.map(|s| s.host.as_str()).filter(|h| !h.is_empty());
        let port = settings.and_then(|s| s.port);
        let database = Some(self.current_db.as_str()).filter(|d| !d.is_empty());

        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('t') => {
                    out.push_str(&Local::now().format("%d/%m/%Y %H:%M:%S").to_string());
                }
                Some('u') => out.push_str(user.unwrap_or("(nil)")),
                Some('H') => out.push_str(host.unwrap_or("(nil)")),
                Some('h') => out.push_str(
                    host.map(|h| h.split('.').next().unwrap_or(h))
                        .unwrap_or("(nil)"),
                ),
                Some('d') => out.push_str(database.unwrap_or("(nil)")),
                Some('p') => match port {
                    Some(port) => out.push_str(&port.to_string()),
                    None => out.push_str("5432"),
                },
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    /// True once a connection is established.
    pub fn is_connected(&self) -> bool {
        self.executor.is_some()
    }

    /// The current database name.
    pub fn database(&self) -> &str {
        &self.current_db
    }

    /// The connected user, empty before the first connect.
    pub fn user(&self) -> String {
        self.executor
            .as_ref()
            .map(|e| e.settings().user.clone())
            .unwrap_or_default()
    }

    /// The connected host, empty before the first connect.
    pub fn host(&self) -> String {
        self.executor
            .as_ref()
            .map(|e| e.settings().host.clone())
            .unwrap_or_default()
    }

    /// The connected port, when known.
    pub fn port(&self) -> Option<u16> {
        self.executor.as_ref().and_then(|e| e.settings().port)
    }

    /// Tears the session down, releasing the connection.
    pub async fn close(&mut self) {
        if let Some(executor) = self.executor.take() {
            executor.close().await;
        }
    }
}

#[async_trait::async_trait]
impl crate::repl::ReplClient for Session {
    fn user(&self) -> String {
        Session::user(self)
    }

    fn database(&self) -> String {
        self.current_db.clone()
    }

    fn host(&self) -> String {
        Session::host(self)
    }

    fn port(&self) -> Option<u16> {
        Session::port(self)
    }

    fn parse_prompt(&self, template: &str) -> String {
        Session::parse_prompt(self, template)
    }

    async fn change_database(&mut self, name: &str) -> Result<()> {
        Session::change_database(self, name).await
    }

    async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        Session::execute(self, sql).await
    }

    async fn execute_special(&mut self, line: &str) -> Result<Option<SpecialResult>> {
        Session::execute_special(self, line).await
    }

    async fn close(&mut self) {
        Session::close(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{ConnectOutcome, MockConn, MockConnector};
    use crate::db::ConnSettings;
    use pretty_assertions::assert_eq;

    struct ScriptedPrompt {
        passwords: Vec<String>,
        prompts: usize,
    }

    impl ScriptedPrompt {
        fn new(passwords: &[&str]) -> Self {
            Self {
                passwords: passwords.iter().rev().map(|s| s.to_string()).collect(),
                prompts: 0,
            }
        }
    }

    impl PasswordPrompt for ScriptedPrompt {
        fn read_password(&mut self, _user: &str) -> Result<String> {
            self.prompts += 1;
            Ok(self.passwords.pop().unwrap_or_default())
        }
    }

    fn session() -> Session {
        Session::new(false, SpecialRegistry::with_defaults())
    }

    #[tokio::test]
    async fn test_connect_installs_executor() {
        let connector = MockConnector::with_conn(MockConn::new());
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap();
        assert!(session.is_connected());
        assert_eq!(session.database(), "testdb");
        assert_eq!(session.user(), "tester");
        assert_eq!(connector.attempts(), 1);
        assert_eq!(prompt.prompts, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_prompts_once_then_succeeds() {
        let connector = MockConnector::new(vec![
            ConnectOutcome::AuthFailure,
            ConnectOutcome::Success(MockConn::new()),
        ]);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&["hunter2"]);
        session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap();
        assert!(session.is_connected());
        assert_eq!(prompt.prompts, 1);
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.passwords_seen(), vec!["hunter2".to_string()]);
    }

    #[tokio::test]
    async fn test_two_auth_failures_prompt_exactly_once() {
        let connector = MockConnector::new(vec![
            ConnectOutcome::AuthFailure,
            ConnectOutcome::AuthFailure,
        ]);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&["wrong", "never-used"]);
        let err = session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(prompt.prompts, 1);
        assert_eq!(connector.attempts(), 2);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_never_prompt_makes_auth_failure_terminal() {
        let connector = MockConnector::new(vec![ConnectOutcome::AuthFailure]);
        let mut session = Session::new(true, SpecialRegistry::with_defaults());
        let mut prompt = ScriptedPrompt::new(&["unused"]);
        let err = session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(prompt.prompts, 0);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_non_auth_failure_is_terminal() {
        let connector =
            MockConnector::new(vec![ConnectOutcome::Refused("connection refused".into())]);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&["unused"]);
        assert!(session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .is_err());
        assert_eq!(prompt.prompts, 0);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_change_database_swaps_then_releases_old() {
        let old_conn = MockConn::new();
        let old_closes = old_conn.close_count();
        let connector = MockConnector::new(vec![
            ConnectOutcome::Success(old_conn),
            ConnectOutcome::Success(MockConn::new()),
        ]);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap();

        session.change_database("analytics").await.unwrap();
        assert_eq!(session.database(), "analytics");
        assert_eq!(connector.databases_requested(), vec!["analytics".to_string()]);
        // The previous connection was released exactly once.
        assert_eq!(old_closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_change_database_failure_keeps_previous() {
        let old_conn = MockConn::new();
        let old_closes = old_conn.close_count();
        let connector = MockConnector::new(vec![
            ConnectOutcome::Success(old_conn),
            ConnectOutcome::Refused("no such database".into()),
        ]);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector.clone()), "tester", &mut prompt)
            .await
            .unwrap();

        assert!(session.change_database("missing").await.is_err());
        // Previous connection and database stay active; nothing was released.
        assert!(session.is_connected());
        assert_eq!(session.database(), "testdb");
        assert_eq!(old_closes.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_change_database_requires_connection() {
        let mut session = session();
        assert!(matches!(
            session.change_database("any").await.unwrap_err(),
            PglineError::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_prompt_tokens_substituted() {
        let conn = MockConn::new().with_settings(ConnSettings {
            host: "db.example.com".to_string(),
            port: Some(5433),
            user: "alice".to_string(),
            password: String::new(),
            database: "app".to_string(),
        });
        let connector = MockConnector::with_conn(conn);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector), "alice", &mut prompt)
            .await
            .unwrap();

        assert_eq!(session.parse_prompt("\\u@\\h:\\d> "), "alice@db:app> ");
        assert_eq!(session.parse_prompt("\\H"), "db.example.com");
        assert_eq!(session.parse_prompt("\\p"), "5433");
        assert_eq!(session.parse_prompt("a\\nb"), "a\nb");
        // Unknown escapes pass through untouched.
        assert_eq!(session.parse_prompt("\\x"), "\\x");
    }

    #[tokio::test]
    async fn test_prompt_substitution_is_single_pass() {
        // A substituted value containing an escape token is not re-matched.
        let conn = MockConn::new().with_settings(ConnSettings {
            host: "node\\d.internal".to_string(),
            port: None,
            user: "bob".to_string(),
            password: String::new(),
            database: "app".to_string(),
        });
        let connector = MockConnector::with_conn(conn);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector), "bob", &mut prompt)
            .await
            .unwrap();

        assert_eq!(session.parse_prompt("\\H"), "node\\d.internal");
        // Port unknown: default display.
        assert_eq!(session.parse_prompt("\\p"), "5432");
    }

    #[tokio::test]
    async fn test_prompt_without_connection_uses_sentinels() {
        let session = session();
        assert_eq!(session.parse_prompt("\\u@\\h:\\d> "), "(nil)@(nil):(nil)> ");
    }

    #[tokio::test]
    async fn test_special_exit_and_fallthrough() {
        let mut session = session();
        assert_eq!(
            session.execute_special("\\q").await.unwrap(),
            Some(SpecialResult::Exit)
        );
        assert_eq!(session.execute_special("SELECT 1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_special_list_databases_collects_rows() {
        let mut conn = MockConn::new();
        conn.push_query(
            vec!["Name"],
            vec![vec![Value::from("app")], vec![Value::from("postgres")]],
        );
        let connector = MockConnector::with_conn(conn);
        let mut session = session();
        let mut prompt = ScriptedPrompt::new(&[]);
        session
            .connect(Box::new(connector), "tester", &mut prompt)
            .await
            .unwrap();

        let result = session.execute_special("\\l").await.unwrap().unwrap();
        match result {
            SpecialResult::Rows(block) => {
                assert_eq!(block.columns, vec!["Name".to_string()]);
                assert_eq!(
                    block.rows,
                    vec![vec!["app".to_string()], vec!["postgres".to_string()]]
                );
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }
}
