//! The read-eval-print loop.
//!
//! One iteration per submitted line: read (history-aware), builtin check,
//! special-command dispatch, then SQL execution with results streamed
//! through the pager. A bad statement never kills the session; only loss of
//! the input mechanism or an explicit quit ends the loop.

pub mod commands;
mod completer;
pub mod history;
mod pager;
pub mod render;

pub use completer::SqlHelper;
pub use pager::Pager;

use std::io::Write;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::StatementResult;
use crate::error::{PglineError, Result};
use crate::repl::history::History;
use crate::session::PasswordPrompt;
use crate::special::SpecialResult;

/// What the REPL needs from the session.
#[async_trait]
pub trait ReplClient: Send {
    fn user(&self) -> String;
    fn database(&self) -> String;
    fn host(&self) -> String;
    fn port(&self) -> Option<u16>;

    fn parse_prompt(&self, template: &str) -> String;

    async fn change_database(&mut self, name: &str) -> Result<()>;
    async fn execute(&mut self, sql: &str) -> Result<StatementResult>;
    async fn execute_special(&mut self, line: &str) -> Result<Option<SpecialResult>>;
    async fn close(&mut self);
}

/// Interactive password prompt for the retry path.
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&mut self, user: &str) -> Result<String> {
        let password = rpassword::prompt_password(format!("Password for {user}: "))?;
        Ok(password)
    }
}

enum Flow {
    Continue,
    Exit,
}

pub struct Repl<C: ReplClient> {
    client: C,
    config: Config,
    history: History,
    editor: Editor<SqlHelper, DefaultHistory>,
}

impl<C: ReplClient> Repl<C> {
    /// Builds the REPL around a connected client. Loads history and primes
    /// the line editor with it.
    pub fn new(client: C, config: Config, special_commands: Vec<&'static str>) -> Result<Self> {
        let editor_config = rustyline::Config::builder()
            .max_history_size(history::MAX_HISTORY_LINES)
            .map_err(|e| PglineError::resource(e.to_string()))?
            .history_ignore_space(true)
            .auto_add_history(false)
            .build();
        let mut editor: Editor<SqlHelper, DefaultHistory> = Editor::with_config(editor_config)
            .map_err(|e| PglineError::resource(e.to_string()))?;
        editor.set_helper(Some(SqlHelper::new(special_commands)));

        let mut history = History::new(&config.main.history_file);
        history.load();
        for entry in history.entries() {
            let _ = editor.add_history_entry(entry);
        }

        Ok(Self {
            client,
            config,
            history,
            editor,
        })
    }

    /// Runs the loop until quit, end of input, or loss of the input
    /// mechanism.
    pub async fn run(&mut self) {
        info!("REPL started");
        loop {
            let prompt = self.client.parse_prompt(&self.config.main.prompt);
            let line = match self.editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    error!(error = %e, "input mechanism failed");
                    self.print_error(&PglineError::resource(e.to_string()));
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(line.as_str());
            self.history.append(&line);

            let start = Instant::now();
            debug!(command_length = line.len(), "received command");

            if let Some(builtin) = commands::builtin(&line) {
                debug!(command = %line, "executing builtin command");
                builtin();
                continue;
            }

            match self.client.execute_special(&line).await {
                Err(e) => {
                    error!(error = %e, "error executing special command");
                    self.print_error(&e);
                    continue;
                }
                Ok(Some(result)) => match self.handle_special(result, start).await {
                    Flow::Exit => {
                        info!("REPL exiting via quit command");
                        break;
                    }
                    Flow::Continue => continue,
                },
                Ok(None) => {}
            }

            debug!("executing query");
            match self.client.execute(&line).await {
                Err(e) => {
                    error!(error = %e, "query execution failed");
                    self.print_error(&e);
                }
                Ok(StatementResult::Query(mut query)) => {
                    if query.columns().is_empty() {
                        // No result shape to render: drain, then report the
                        // status tag alone.
                        while let Ok(Some(_)) = query.next().await {}
                        self.page_text(&query.status_tag());
                        self.print_time(query.duration().execution_time);
                        continue;
                    }
                    let mut pager = Pager::open();
                    let rendered = render::render_query(&mut query, &mut pager).await;
                    match rendered {
                        Ok(()) => {
                            let _ = writeln!(pager, "{}", query.status_tag());
                        }
                        Err(e) => {
                            error!(error = %e, "error rendering query result");
                            self.print_error(&e);
                        }
                    }
                    if let Err(e) = pager.close() {
                        warn!(error = %e, "pager exited with error");
                    }
                    let duration = query.duration();
                    debug!(
                        execution_ms = duration.execution_time.as_millis() as u64,
                        ttfr_ms = duration.time_to_first_row.as_millis() as u64,
                        stream_ms = duration.stream_duration.as_millis() as u64,
                        "query timing"
                    );
                    self.print_time(duration.execution_time);
                }
                Ok(StatementResult::Exec(exec)) => {
                    self.page_text(&exec.status_tag);
                    self.print_time(exec.duration.execution_time);
                }
            }
        }
    }

    /// Dispatches a recognized special-command result.
    async fn handle_special(&mut self, result: SpecialResult, start: Instant) -> Flow {
        match result {
            SpecialResult::Exit => return Flow::Exit,

            SpecialResult::ChangeDatabase(name) => {
                if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                    if let Err(e) = self.client.change_database(&name).await {
                        error!(error = %e, database = %name, "database change failed");
                        self.print_error(&e);
                        self.print_info("Previous connection kept");
                        return Flow::Continue;
                    }
                }
                self.print_info(&format!(
                    "You are now connected to database {:?} as user {:?}",
                    self.client.database(),
                    self.client.user(),
                ));
            }

            SpecialResult::ConnectionInfo => {
                let host = self.client.host();
                let host = if host.starts_with('/') {
                    format!("Socket {host:?}")
                } else {
                    format!("Host {host:?}")
                };
                let port = match self.client.port() {
                    Some(port) => port.to_string(),
                    None => "None".to_string(),
                };
                self.print_info(&format!(
                    "You are connected to database {:?} as user {:?} on {} at port {}",
                    self.client.database(),
                    self.client.user(),
                    host,
                    port,
                ));
            }

            SpecialResult::Rows(block) => {
                let mut pager = Pager::open();
                if let Err(e) = render::render_block(&block, &mut pager) {
                    self.print_error(&e);
                }
                if let Err(e) = pager.close() {
                    warn!(error = %e, "pager exited with error");
                }
                self.print_time(start.elapsed());
            }

            SpecialResult::Tables(blocks) => {
                let mut pager = Pager::open();
                for block in &blocks {
                    if let Err(e) = render::render_block(block, &mut pager) {
                        self.print_error(&e);
                        break;
                    }
                }
                if let Err(e) = pager.close() {
                    warn!(error = %e, "pager exited with error");
                }
                self.print_time(start.elapsed());
            }

            // Recognized kinds with no defined rendering are a silent no-op.
            SpecialResult::Quiet => {}
        }
        Flow::Continue
    }

    /// Writes a short text through the pager path.
    fn page_text(&self, text: &str) {
        let mut pager = Pager::open();
        let _ = writeln!(pager, "{text}");
        if let Err(e) = pager.close() {
            warn!(error = %e, "pager exited with error");
        }
    }

    fn print_error(&self, err: &PglineError) {
        eprintln!("{}", err.to_string().bright_red());
    }

    fn print_info(&self, message: &str) {
        println!("{}", message.white());
    }

    fn print_time(&self, duration: Duration) {
        eprintln!("{}", format!("Time: {:.3}s", duration.as_secs_f64()).bright_cyan());
    }

    /// Saves session history and tears the client down.
    pub async fn shutdown(mut self) {
        debug!("REPL closing, saving history");
        self.history.save();
        self.client.close().await;
        info!("REPL closed");
    }
}
