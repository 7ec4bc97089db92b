//! Special (backslash) command registry.
//!
//! An explicit registry object, constructed once at startup and handed to the
//! session; no process-wide registration. The registry only recognizes lines
//! and maps them to actions; actions that need the server (listing databases,
//! describing tables) are carried out by the session, which owns the
//! executor.

/// A recognized special command, before any server interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialAction {
    /// Terminate the REPL.
    Exit,
    /// Switch to another database (no argument: just report the current one).
    ChangeDatabase(Option<String>),
    /// Report connection details.
    ConnectionInfo,
    /// Show the command help table.
    Help,
    /// List databases.
    ListDatabases,
    /// List tables in the current database.
    ListTables,
    /// Describe one table.
    DescribeTable(String),
}

/// What a special command produced, dispatched by the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialResult {
    /// Terminate the loop.
    Exit,
    /// Ask the REPL to perform the database switch and report it.
    ChangeDatabase(Option<String>),
    /// Ask the REPL to print connection details.
    ConnectionInfo,
    /// One tabular block to render.
    Rows(TableBlock),
    /// Several tabular blocks to render (table descriptions).
    Tables(Vec<TableBlock>),
    /// Recognized, but nothing to render.
    Quiet,
}

/// A rendered-ready block of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBlock {
    pub title: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// What a registry entry does; the argument handling lives in `recognize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Exit,
    ChangeDatabase,
    ConnectionInfo,
    Help,
    ListDatabases,
    ListTables,
    DescribeTable,
}

struct CommandDef {
    name: &'static str,
    aliases: &'static [&'static str],
    syntax: &'static str,
    description: &'static str,
    case_sensitive: bool,
    kind: CommandKind,
}

/// The registry of special commands.
pub struct SpecialRegistry {
    commands: Vec<CommandDef>,
}

impl SpecialRegistry {
    /// The built-in command set.
    pub fn with_defaults() -> Self {
        Self {
            commands: vec![
                CommandDef {
                    name: "\\q",
                    aliases: &["\\quit"],
                    syntax: "\\q",
                    description: "Quit pgline",
                    case_sensitive: true,
                    kind: CommandKind::Exit,
                },
                CommandDef {
                    name: "\\c",
                    aliases: &["\\connect"],
                    syntax: "\\c database_name",
                    description: "Connect to another database",
                    case_sensitive: true,
                    kind: CommandKind::ChangeDatabase,
                },
                CommandDef {
                    name: "\\conninfo",
                    aliases: &[],
                    syntax: "\\conninfo",
                    description: "Show connection details",
                    case_sensitive: false,
                    kind: CommandKind::ConnectionInfo,
                },
                CommandDef {
                    name: "\\l",
                    aliases: &["\\list"],
                    syntax: "\\l",
                    description: "List databases",
                    case_sensitive: false,
                    kind: CommandKind::ListDatabases,
                },
                CommandDef {
                    name: "\\dt",
                    aliases: &[],
                    syntax: "\\dt",
                    description: "List tables",
                    case_sensitive: false,
                    kind: CommandKind::ListTables,
                },
                CommandDef {
                    name: "\\d",
                    aliases: &[],
                    syntax: "\\d table_name",
                    description: "Describe a table",
                    case_sensitive: false,
                    kind: CommandKind::DescribeTable,
                },
                CommandDef {
                    name: "\\?",
                    aliases: &["\\help"],
                    syntax: "\\?",
                    description: "Show this help",
                    case_sensitive: false,
                    kind: CommandKind::Help,
                },
            ],
        }
    }

    /// Command names and aliases, for the line-editor completer.
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for def in &self.commands {
            names.push(def.name);
            names.extend_from_slice(def.aliases);
        }
        names
    }

    /// Offers a line to the registry. `None` means "not a special command,
    /// fall through to SQL" — including unknown backslash commands, which the
    /// server will reject with its own error.
    pub fn recognize(&self, line: &str) -> Option<SpecialAction> {
        let trimmed = line.trim();
        if !trimmed.starts_with('\\') {
            return None;
        }
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let word = parts.next()?;
        let args = parts.next().unwrap_or("").trim();

        let def = self.commands.iter().find(|def| {
            let matches = |candidate: &str| {
                if def.case_sensitive {
                    word == candidate
                } else {
                    word.eq_ignore_ascii_case(candidate)
                }
            };
            matches(def.name) || def.aliases.iter().any(|a| matches(a))
        })?;

        match def.kind {
            CommandKind::Exit => Some(SpecialAction::Exit),
            CommandKind::ChangeDatabase => {
                let name = if args.is_empty() {
                    None
                } else {
                    Some(args.to_string())
                };
                Some(SpecialAction::ChangeDatabase(name))
            }
            CommandKind::ConnectionInfo => Some(SpecialAction::ConnectionInfo),
            CommandKind::Help => Some(SpecialAction::Help),
            CommandKind::ListDatabases => Some(SpecialAction::ListDatabases),
            CommandKind::ListTables => Some(SpecialAction::ListTables),
            CommandKind::DescribeTable => {
                if args.is_empty() {
                    // \d with no argument behaves like \dt.
                    Some(SpecialAction::ListTables)
                } else {
                    Some(SpecialAction::DescribeTable(args.to_string()))
                }
            }
        }
    }

    /// The help table describing every registered command.
    pub fn help_block(&self) -> TableBlock {
        TableBlock {
            title: None,
            columns: vec!["Command".to_string(), "Description".to_string()],
            rows: self
                .commands
                .iter()
                .map(|def| vec![def.syntax.to_string(), def.description.to_string()])
                .collect(),
        }
    }
}

impl Default for SpecialRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
