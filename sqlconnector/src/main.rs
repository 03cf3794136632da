//! SQL Server connection diagnostics.
//!
//! This binary builds a connector from command-line settings and either
//! describes it without touching the network or performs a live
//! connection test.
//!
//! # Security Guarantees
//! - Passwords are read from the environment or an interactive prompt
//! - Connection strings are only ever printed with the password masked
//! - No credentials are logged

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlconnector_core::{
    ConnectionInfoFlags, ConnectionSettings, DEFAULT_CONNECT_TIMEOUT_SECS, ProtectedSecret,
    SqlServerConnector, init_logging,
};
use tracing::{error, info};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "sqlconnector")]
#[command(about = "SQL Server connection diagnostics")]
#[command(version)]
#[command(long_about = "
sqlconnector - SQL Server connection diagnostics

Builds a connection from the given settings and reports on it:
- info: describe the connection without connecting
- test: open a connection, optionally switch database, and report

SECURITY FEATURES:
- Password taken from SQLCONNECTOR_PASSWORD or an interactive prompt
- Connection strings printed with the password masked
- No credentials logged

EXAMPLES:
  sqlconnector --server db1 --catalog orders --integrated info
  sqlconnector --server db1 --catalog orders --user app test --database billing
  sqlconnector --server 'db1\\SQLEXPRESS' --integrated info --fields data-source,timeout
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Describe the connection without connecting
    Info(InfoArgs),
    /// Open a connection and report on it
    Test(TestArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    /// Attributes to report
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = InfoField::all(),
        help = "Comma-separated attributes to report"
    )]
    pub fields: Vec<InfoField>,

    /// Print the connection string with the password masked
    #[arg(long, help = "Also print the connection string (password masked)")]
    pub show_connection_string: bool,
}

#[derive(Args)]
pub struct TestArgs {
    /// Database to switch to after connecting
    #[arg(long, help = "Switch to this database after connecting")]
    pub database: Option<String>,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Server name
    #[arg(
        short,
        long,
        env = "SQLCONNECTOR_SERVER",
        help = "Server (host, host,port or host\\INSTANCE)"
    )]
    pub server: String,

    /// Initial catalog
    #[arg(short, long, env = "SQLCONNECTOR_CATALOG", help = "Initial database")]
    pub catalog: Option<String>,

    /// Use integrated security
    #[arg(
        long,
        env = "SQLCONNECTOR_INTEGRATED",
        conflicts_with = "user",
        help = "Authenticate with the current identity instead of a SQL login"
    )]
    pub integrated: bool,

    /// SQL login
    #[arg(short, long, env = "SQLCONNECTOR_USER", help = "SQL login name")]
    pub user: Option<String>,

    /// SQL login password
    #[arg(
        long,
        env = "SQLCONNECTOR_PASSWORD",
        hide_env_values = true,
        help = "SQL login password (prefer the environment variable or the prompt)"
    )]
    pub password: Option<String>,

    /// Never prompt for a password
    #[arg(long, help = "Do not prompt for a missing password")]
    pub no_prompt: bool,

    /// Application name
    #[arg(
        long,
        env = "SQLCONNECTOR_APPLICATION_NAME",
        help = "Application name reported to the server"
    )]
    pub application_name: Option<String>,

    /// Connect timeout
    #[arg(
        short,
        long,
        env = "SQLCONNECTOR_TIMEOUT",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        help = "Connect timeout in seconds (0 waits indefinitely)"
    )]
    pub timeout: u32,

    /// Trust the server certificate
    #[arg(
        long,
        env = "SQLCONNECTOR_TRUST_SERVER_CERTIFICATE",
        help = "Accept the server certificate without validation"
    )]
    pub trust_server_certificate: bool,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Attribute names accepted by `info --fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InfoField {
    /// Server name
    DataSource,
    /// Initial catalog
    Catalog,
    /// SQL login name
    User,
    /// Integrated security flag
    IntegratedSecurity,
    /// Connect timeout
    Timeout,
}

impl InfoField {
    fn all() -> Vec<Self> {
        Self::value_variants().to_vec()
    }

    const fn flag(self) -> ConnectionInfoFlags {
        match self {
            Self::DataSource => ConnectionInfoFlags::DATA_SOURCE,
            Self::Catalog => ConnectionInfoFlags::INITIAL_CATALOG,
            Self::User => ConnectionInfoFlags::USER,
            Self::IntegratedSecurity => ConnectionInfoFlags::INTEGRATED_SECURITY,
            Self::Timeout => ConnectionInfoFlags::CONNECTION_TIMEOUT,
        }
    }
}

/// Combines the selected fields into info flags.
fn info_flags(fields: &[InfoField]) -> ConnectionInfoFlags {
    fields
        .iter()
        .fold(ConnectionInfoFlags::empty(), |flags, field| flags | field.flag())
}

impl TargetArgs {
    /// Builds connection settings, taking the password from the arguments
    /// or from `password_source` when a SQL login has none.
    fn to_settings<F>(&self, password_source: F) -> Result<ConnectionSettings>
    where
        F: FnOnce() -> Result<Option<Zeroizing<String>>>,
    {
        let catalog = self.catalog.clone().unwrap_or_default();

        let mut settings = if self.integrated {
            ConnectionSettings::integrated(self.server.as_str(), catalog)
        } else {
            let password = match &self.password {
                Some(password) => Some(ProtectedSecret::new(password)),
                None if self.user.is_some() && !self.no_prompt => {
                    password_source()?.map(ProtectedSecret::from)
                }
                None => None,
            };

            ConnectionSettings {
                server: self.server.clone(),
                catalog: Some(catalog),
                user_id: self.user.clone(),
                password,
                ..Default::default()
            }
        };

        if let Some(name) = &self.application_name {
            settings = settings.with_application_name(name.as_str());
        }

        Ok(settings
            .with_connect_timeout(self.timeout)
            .with_trust_server_certificate(self.trust_server_certificate))
    }
}

fn prompt_password() -> Result<Option<Zeroizing<String>>> {
    let password = Zeroizing::new(
        rpassword::prompt_password("Password: ").context("Failed to read password")?,
    );
    Ok(Some(password))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Info(args) => {
            let settings = cli.target.to_settings(|| Ok(None))?;
            describe(settings, args, cli.global.quiet)
        }
        Command::Test(args) => {
            let settings = cli.target.to_settings(prompt_password)?;
            test_connection(settings, args).await
        }
    }
}

/// Prints the requested attributes without connecting
fn describe(settings: ConnectionSettings, args: &InfoArgs, quiet: bool) -> Result<()> {
    let connection_string = if args.show_connection_string {
        Some(settings.to_connection_string()?.redacted())
    } else {
        None
    };

    let connector = SqlServerConnector::sql_server(settings)?;
    let info = connector.connection_info(info_flags(&args.fields));

    if !quiet {
        println!("{}", info);
        if let Some(connection_string) = connection_string {
            println!("{}", connection_string);
        }
    }
    Ok(())
}

/// Opens a connection, optionally switches database, and reports the result
async fn test_connection(settings: ConnectionSettings, args: &TestArgs) -> Result<()> {
    info!("Testing connection to {}", settings);

    let mut connector = SqlServerConnector::sql_server(settings)?;

    let outcome = async {
        connector
            .acquire_connection()
            .await
            .context("Connection test failed")?;

        if let Some(database) = &args.database {
            connector
                .switch_database(database)
                .await
                .with_context(|| format!("Failed to switch to database '{}'", database))?;
        }
        anyhow::Ok(())
    }
    .await;

    let report = connector.connection_info(ConnectionInfoFlags::all());
    connector.dispose().await;

    match outcome {
        Ok(()) => {
            info!("✓ Connection test successful");
            println!("Connection successful: {}", report);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
