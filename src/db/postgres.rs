//! The real connection over tokio-postgres.
//!
//! Column metadata comes from preparing the statement, so it is fixed before
//! the first row arrives; rows are pulled one at a time from the driver's
//! row stream and converted to dynamically-typed values by column type name.

use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls, RowStream};
use tracing::{debug, warn};

use crate::db::{CommandTag, Conn, ConnSettings, Row, RowSource, Value};
use crate::error::{PglineError, Result};

/// One live tokio-postgres connection plus its spawned I/O task.
pub struct PgConn {
    client: Option<Client>,
    io_task: Option<JoinHandle<()>>,
    settings: ConnSettings,
}

impl PgConn {
    /// Opens a connection from a resolved driver config.
    pub async fn connect(config: Config) -> Result<Self> {
        let settings = ConnSettings::from_config(&config);
        let (client, connection) = config.connect(NoTls).await?;
        // The connection future performs the actual socket I/O; it runs until
        // the client is dropped.
        let io_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "connection task ended with error");
            }
        });
        Ok(Self {
            client: Some(client),
            io_task: Some(io_task),
            settings,
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(PglineError::NotConnected)
    }
}

#[async_trait]
impl Conn for PgConn {
    async fn query(&mut self, sql: &str) -> Result<(Vec<String>, Box<dyn RowSource>)> {
        let client = self.client()?;
        let statement = client.prepare(sql).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let stream = client.query_raw(&statement, Vec::<String>::new()).await?;
        let source = PgRowSource::new(stream, statement_verb(sql));
        Ok((columns, Box::new(source)))
    }

    async fn exec(&mut self, sql: &str) -> Result<CommandTag> {
        let rows = self.client()?.execute(sql, &[]).await?;
        Ok(statement_tag(sql, rows))
    }

    async fn ping(&mut self) -> Result<()> {
        // An empty simple query round-trips the wire without side effects.
        self.client()?.simple_query("").await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.client = None;
        if let Some(task) = self.io_task.take() {
            let _ = task.await;
        }
        debug!("connection closed");
    }

    fn settings(&self) -> &ConnSettings {
        &self.settings
    }
}

/// Forward-only row source over the driver's row stream.
struct PgRowSource {
    stream: Option<Pin<Box<RowStream>>>,
    verb: String,
    rows_seen: u64,
}

impl PgRowSource {
    fn new(stream: RowStream, verb: String) -> Self {
        Self {
            stream: Some(Box::pin(stream)),
            verb,
            rows_seen: 0,
        }
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(row)) => {
                self.rows_seen += 1;
                Ok(Some(convert_row(&row)))
            }
            Some(Err(e)) => {
                self.stream = None;
                Err(e.into())
            }
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    fn command_tag(&self) -> CommandTag {
        CommandTag::from_verb(&self.verb, self.rows_seen)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

/// The leading keyword of a statement, used for completion tags.
fn statement_verb(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(';')
        .to_uppercase()
}

/// Reconstructs a server-style completion tag from the statement text and the
/// driver-reported row count.
fn statement_tag(sql: &str, rows: u64) -> CommandTag {
    let mut words = sql.split_whitespace();
    let verb = words
        .next()
        .unwrap_or("")
        .trim_end_matches(';')
        .to_uppercase();
    match verb.as_str() {
        "INSERT" | "UPDATE" | "DELETE" | "SELECT" | "MOVE" | "FETCH" | "COPY" => {
            CommandTag::from_verb(&verb, rows)
        }
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => match words.next() {
            Some(object) => CommandTag::new(format!(
                "{verb} {}",
                object.trim_end_matches(';').to_uppercase()
            )),
            None => CommandTag::new(verb),
        },
        _ => CommandTag::new(verb),
    }
}

/// Converts a driver row to dynamically-typed values.
fn convert_row(row: &tokio_postgres::Row) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_().name()))
        .collect()
}

/// Converts a single column value by its type name. Types the client cannot
/// decode fall back to text, then to NULL.
fn convert_value(row: &tokio_postgres::Row, index: usize, type_name: &str) -> Value {
    match type_name {
        "bool" => row
            .try_get::<_, Option<bool>>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "int2" => row
            .try_get::<_, Option<i16>>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "int4" => row
            .try_get::<_, Option<i32>>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "int8" => row
            .try_get::<_, Option<i64>>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "float4" => row
            .try_get::<_, Option<f32>>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "float8" => row
            .try_get::<_, Option<f64>>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // Everything else: try text, fall back to NULL.
        _ => row
            .try_get::<_, Option<String>>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
