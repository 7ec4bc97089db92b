//! Command-line argument parsing.

use clap::Parser;

/// An interactive PostgreSQL command-line client.
#[derive(Parser, Debug)]
#[command(name = "pgline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database name, connection URI, or key=value DSN
    #[arg(value_name = "DBNAME")]
    pub dbname_arg: Option<String>,

    /// User name to connect as
    #[arg(value_name = "USERNAME")]
    pub username_arg: Option<String>,

    /// Host address of the PostgreSQL server
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port the server is listening on
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// User name to connect as
    #[arg(short = 'U', long = "username", value_name = "USER")]
    pub username: Option<String>,

    /// Database name to connect to
    #[arg(short = 'd', long, value_name = "DBNAME")]
    pub dbname: Option<String>,

    /// Never prompt for the password
    #[arg(short = 'w', long = "no-password", conflicts_with = "force_password")]
    pub no_password: bool,

    /// Force a password prompt before connecting
    #[arg(short = 'W', long = "password")]
    pub force_password: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Resolves the effective database and user from flags and positionals.
    ///
    /// `pgline -d mydb someuser` treats the positional as the user when the
    /// database was already given by flag; otherwise flags win over
    /// positionals.
    pub fn resolve_db_and_user(&self) -> (Option<String>, Option<String>) {
        if self.dbname.is_some() && self.dbname_arg.is_some() && self.username_arg.is_none() {
            return (self.dbname.clone(), self.dbname_arg.clone());
        }
        let database = self.dbname.clone().or_else(|| self.dbname_arg.clone());
        let user = self.username.clone().or_else(|| self.username_arg.clone());
        (database, user)
    }
}
