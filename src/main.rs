//! pgline binary entry point: argument parsing, config and logging setup,
//! initial connection (with the single password retry), then the REPL.

use clap::Parser;
use colored::Colorize;
use tracing::info;

use pgline::cli::Cli;
use pgline::config::Config;
use pgline::db::{Connector, PgConnector};
use pgline::error::Result;
use pgline::logging;
use pgline::repl::{Repl, TerminalPrompt};
use pgline::session::{PasswordPrompt, Session};
use pgline::special::SpecialRegistry;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_create(&Config::default_path());
    logging::init(cli.debug, &config.log_path());
    info!("pgline started");

    if let Err(e) = run(cli, config).await {
        eprintln!("{}", e.to_string().bright_red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    // Absorb interrupts for the lifetime of the process so Ctrl-C cannot
    // kill an in-flight statement. It does not cancel the statement.
    tokio::spawn(async {
        loop {
            let _ = tokio::signal::ctrl_c().await;
        }
    });

    let (database, user) = cli.resolve_db_and_user();
    let user = user
        .or_else(|| std::env::var("PGUSER").ok().filter(|u| !u.is_empty()))
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default();
    let database = database.unwrap_or_else(|| user.clone());

    let registry = SpecialRegistry::with_defaults();
    let special_names = registry.command_names();
    let mut session = Session::new(cli.no_password, registry);
    let mut prompt = TerminalPrompt;

    let connector: Box<dyn Connector> = if database.contains("://") || database.contains('=') {
        Box::new(PgConnector::from_uri(&database)?)
    } else {
        let password = if cli.no_password {
            // Environment-sourced credential, empty if absent; never prompt.
            Some(std::env::var("PGPASSWORD").unwrap_or_default())
        } else if cli.force_password {
            Some(prompt.read_password(&user)?)
        } else {
            None
        };
        info!(host = ?cli.host, port = ?cli.port, database = %database, user = %user, "using field-based connection");
        Box::new(PgConnector::from_fields(
            cli.host.clone(),
            cli.port,
            Some(user.clone()),
            password,
            Some(database.clone()),
        ))
    };

    session.connect(connector, &user, &mut prompt).await?;

    let mut repl = Repl::new(session, config, special_names)?;
    repl.run().await;
    repl.shutdown().await;
    Ok(())
}
