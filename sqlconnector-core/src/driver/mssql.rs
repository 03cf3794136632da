//! SQL Server driver built on `tiberius`.
//!
//! This module provides the SQL Server implementation of the driver traits:
//! - ADO.NET connection strings parsed by `tiberius::Config`
//! - Named instances resolved through the SQL Browser service
//! - A single server-requested routing redirect followed transparently
//! - Transport failures recorded so the connector can reconnect
//! - Integrated security rejected up front when this build cannot perform it
//!
//! # Security
//! - The connection string is never logged
//! - Driver errors are wrapped with sanitized context

use super::{ConnectionState, Driver, DriverConnection};
use crate::{
    Result,
    connection_string::{ConnectionString, keys, parse_bool, synonyms},
    error::ConnectorError,
};
use async_trait::async_trait;
use tiberius::{Client, Config, SqlBrowser, error::Error as TdsError};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

/// Whether this build can log in with integrated security: SSPI through the
/// `winauth` feature on Windows, Kerberos through `integrated-auth-gssapi` on Unix.
pub const INTEGRATED_AUTH_AVAILABLE: bool = cfg!(any(
    all(windows, feature = "winauth"),
    all(unix, feature = "integrated-auth-gssapi")
));

/// The `tiberius` client type handed out by [`TiberiusConnection::client`].
pub type SqlServerClient = Client<Compat<TcpStream>>;

/// Opens SQL Server connections with `tiberius` over Tokio TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusDriver;

impl TiberiusDriver {
    /// Creates the driver.
    pub const fn new() -> Self {
        Self
    }

    async fn connect(config: Config) -> std::result::Result<SqlServerClient, TdsError> {
        let tcp = TcpStream::connect_named(&config).await?;
        tcp.set_nodelay(true)?;

        match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => Ok(client),
            Err(TdsError::Routing { host, port }) => {
                debug!(%host, port, "Server redirected the connection");
                let mut routed = config;
                routed.host(&host);
                routed.port(port);

                let tcp = TcpStream::connect(routed.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(routed, tcp.compat_write()).await
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Driver for TiberiusDriver {
    type Connection = TiberiusConnection;

    async fn open(&self, connection_string: &str) -> Result<TiberiusConnection> {
        let config = prepare(connection_string)?;

        let client = Self::connect(config).await.map_err(|e| {
            ConnectorError::connection_failed("Failed to open SQL Server connection", e)
        })?;

        Ok(TiberiusConnection {
            client: Some(client),
            state: ConnectionState::Open,
        })
    }
}

/// An open `tiberius` client plus the state the connector inspects.
pub struct TiberiusConnection {
    client: Option<SqlServerClient>,
    state: ConnectionState,
}

impl std::fmt::Debug for TiberiusConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiberiusConnection")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TiberiusConnection {
    /// The live client for running queries, or `None` unless the connection is open.
    pub fn client(&mut self) -> Option<&mut SqlServerClient> {
        match self.state {
            ConnectionState::Open => self.client.as_mut(),
            ConnectionState::Closed | ConnectionState::Broken => None,
        }
    }

    /// Records a transport failure seen while querying through [`client`](Self::client),
    /// so the next acquire reconnects.
    pub fn record_error(&mut self, error: &TdsError) {
        if is_transport_failure(error) {
            warn!("SQL Server connection is broken and will be replaced");
            self.state = ConnectionState::Broken;
        }
    }
}

#[async_trait]
impl DriverConnection for TiberiusConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn change_database(&mut self, database: &str) -> Result<()> {
        let Some(client) = self.client() else {
            return Err(ConnectorError::connection_failed(
                "Cannot switch database on a connection that is not open",
                std::io::Error::from(std::io::ErrorKind::NotConnected),
            ));
        };

        let statement = format!("USE {}", quote_identifier(database));
        let result = client.execute(statement, &[]).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.record_error(&e);
                Err(ConnectorError::connection_failed("Failed to switch database", e))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        if let Some(client) = self.client.take() {
            client.close().await.map_err(|e| {
                ConnectorError::connection_failed("Failed to close SQL Server connection", e)
            })?;
        }
        Ok(())
    }
}

/// Turns an ADO.NET string into a `tiberius` config.
///
/// `tiberius` silently falls back to an empty SQL login when asked for
/// integrated security without platform support, and ignores the
/// `Trusted_Connection` spelling of that key.
fn prepare(connection_string: &str) -> Result<Config> {
    if !connection_string.is_ascii() {
        return Err(ConnectorError::configuration(
            "SQL Server connection strings must be ASCII",
        ));
    }

    let mut parsed = ConnectionString::parse(connection_string)?;
    if parsed
        .get_any(synonyms::INTEGRATED_SECURITY)
        .and_then(parse_bool)
        == Some(true)
    {
        if !INTEGRATED_AUTH_AVAILABLE {
            return Err(ConnectorError::configuration(
                "integrated security requires the `winauth` (Windows) or \
                 `integrated-auth-gssapi` (Unix) feature",
            ));
        }
        parsed.remove_any(synonyms::INTEGRATED_SECURITY);
        parsed.set(keys::INTEGRATED_SECURITY, "True");
    }

    Config::from_ado_string(&parsed.render()).map_err(|e| {
        ConnectorError::connection_failed("Invalid SQL Server connection string", e)
    })
}

/// Errors after which the TDS stream can no longer be trusted.
fn is_transport_failure(error: &TdsError) -> bool {
    matches!(
        error,
        TdsError::Io { .. } | TdsError::Protocol(_) | TdsError::Tls(_)
    )
}

/// Brackets a database name for `USE`, doubling any closing bracket.
fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}
