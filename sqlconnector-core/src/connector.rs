//! Lazy connection management on top of a [`Driver`].
//!
//! A `Connector` builds its connection string once, keeps it protected, and
//! only touches the network when [`Connector::acquire_connection`] finds no
//! usable connection. Closed and broken connections are replaced
//! transparently on the next acquire.
//!
//! # Security
//! - The connection string is stored as a [`ProtectedSecret`]
//! - Its plaintext is revealed only for the duration of a connect call
//! - Log events name the server and catalog, never credentials

use crate::{
    Result,
    connection_string::{ConnectionString, keys, synonyms},
    driver::{ConnectionState, Driver, DriverConnection},
    error::ConnectorError,
    info::{ConnectionDetails, ConnectionInfoFlags, format_connection_info},
    security::ProtectedSecret,
    settings::ConnectionSettings,
};
use tracing::{debug, trace, warn};

#[cfg(feature = "mssql")]
use crate::driver::TiberiusDriver;

#[cfg(test)]
mod tests;

/// Owns one protected connection string and at most one physical connection.
///
/// The connector is meant for use from a single task; every operation that
/// touches the connection takes `&mut self`.
///
/// # Example
/// ```rust,no_run
/// use sqlconnector_core::{ConnectionInfoFlags, ConnectionSettings, Connector};
///
/// # async fn run() -> sqlconnector_core::Result<()> {
/// let settings = ConnectionSettings::integrated("db1", "orders").with_connect_timeout(30);
/// let mut connector = Connector::sql_server(settings)?;
///
/// // First acquire opens the connection
/// let connection = connector.acquire_connection().await?;
/// if let Some(client) = connection.client() {
///     client.simple_query("SELECT 1").await.ok();
/// }
///
/// connector.switch_database("billing").await?;
/// assert_eq!(
///     connector.connection_info(ConnectionInfoFlags::INITIAL_CATALOG),
///     "Initial catalog: billing"
/// );
///
/// connector.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct Connector<D: Driver> {
    driver: D,
    connection_string: ProtectedSecret,
    details: ConnectionDetails,
    connection: Option<D::Connection>,
    disposed: bool,
}

impl<D: Driver> std::fmt::Debug for Connector<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("details", &self.details)
            .field("state", &self.connection_state())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> Connector<D> {
    /// Builds the connection string from `settings` without connecting.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the settings carry a cleared password.
    pub fn new(settings: ConnectionSettings, driver: D) -> Result<Self> {
        let details = ConnectionDetails::from(&settings);
        let connection_string = settings.to_connection_string()?.to_protected();

        debug!(
            server = %details.server,
            catalog = %details.catalog,
            integrated_security = details.integrated_security,
            "Built connection string"
        );

        Ok(Self {
            driver,
            connection_string,
            details,
            connection: None,
            disposed: false,
        })
    }

    /// Adopts a ready-made connection string.
    ///
    /// The string is parsed once so the server, catalog and info fields are
    /// known without connecting.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a cleared secret and `Configuration` for
    /// a string that cannot be parsed.
    pub fn from_connection_string(connection_string: ProtectedSecret, driver: D) -> Result<Self> {
        let details = {
            let plain = connection_string.reveal()?;
            let parsed = ConnectionString::parse(&plain)?;
            ConnectionDetails::from_connection_string(&parsed)?
        };

        Ok(Self {
            driver,
            connection_string,
            details,
            connection: None,
            disposed: false,
        })
    }

    /// Current server.
    pub fn server(&self) -> &str {
        &self.details.server
    }

    /// Current catalog; empty when none is selected.
    pub fn catalog(&self) -> &str {
        &self.details.catalog
    }

    /// Credential-free view of the current target.
    pub const fn details(&self) -> &ConnectionDetails {
        &self.details
    }

    /// The stored connection string, still protected.
    pub const fn connection_string(&self) -> &ProtectedSecret {
        &self.connection_string
    }

    /// State of the physical connection, `None` if none was ever opened.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(DriverConnection::state)
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns the live connection, opening a new one if there is none or
    /// the previous one is closed or broken.
    ///
    /// This is the only operation that connects. It waits at most the
    /// configured connect timeout; a timeout of zero waits indefinitely.
    ///
    /// # Errors
    /// - `Disposed` after [`dispose`](Self::dispose)
    /// - `ConnectionTimeout` when the connect attempt exceeds the timeout
    /// - `Connection` with the driver's error as source otherwise
    pub async fn acquire_connection(&mut self) -> Result<&mut D::Connection> {
        if self.disposed {
            return Err(ConnectorError::Disposed);
        }

        let connection = match self.connection.take() {
            Some(existing) if !existing.state().needs_reconnect() => existing,
            stale => {
                if let Some(previous) = &stale {
                    debug!(state = %previous.state(), "Replacing unusable connection");
                }
                drop(stale);
                self.open().await?
            }
        };

        Ok(self.connection.insert(connection))
    }

    async fn open(&self) -> Result<D::Connection> {
        let timeout = self.details.connect_timeout();
        debug!(
            server = %self.details.server,
            catalog = %self.details.catalog,
            timeout_secs = self.details.connect_timeout_secs,
            "Opening database connection"
        );

        let plain = self.connection_string.reveal()?;
        let connect = self.driver.open(&plain);

        let connection = if timeout.is_zero() {
            connect.await?
        } else {
            tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| ConnectorError::ConnectionTimeout(timeout))??
        };

        trace!("Database connection open");
        Ok(connection)
    }

    /// Closes the physical connection if one is open. Never fails; a
    /// failed graceful close is logged and the connection counts as closed.
    pub async fn close_connection(&mut self) {
        if let Some(connection) = self.connection.as_mut()
            && connection.state() == ConnectionState::Open
        {
            if let Err(e) = connection.close().await {
                warn!("Closing the database connection failed: {}", e);
            }
            debug!("Database connection closed");
        }
    }

    /// Makes `database` the active catalog.
    ///
    /// An open connection is switched immediately. The stored connection
    /// string is rebuilt with the new catalog either way, so a connection
    /// opened later (first use or reconnect) lands in `database` as well.
    ///
    /// # Errors
    /// - `InvalidArgument` when `database` is empty
    /// - `Disposed` after [`dispose`](Self::dispose)
    /// - `Connection` if the open connection rejects the switch; the
    ///   current catalog is left unchanged in that case
    pub async fn switch_database(&mut self, database: &str) -> Result<()> {
        if database.is_empty() {
            return Err(ConnectorError::invalid_argument(
                "database",
                "database name must not be empty",
            ));
        }
        if self.disposed {
            return Err(ConnectorError::Disposed);
        }

        // Built before the live switch so a failure here leaves the server untouched
        let rebuilt = {
            let plain = self.connection_string.reveal()?;
            let mut parsed = ConnectionString::parse(&plain)?;
            parsed.replace_any(synonyms::INITIAL_CATALOG, keys::INITIAL_CATALOG, database);
            parsed.to_protected()
        };

        if let Some(connection) = self.connection.as_mut()
            && connection.state() == ConnectionState::Open
        {
            connection.change_database(database).await?;
        }

        self.connection_string = rebuilt;
        database.clone_into(&mut self.details.catalog);

        debug!(catalog = %self.details.catalog, "Switched database");
        Ok(())
    }

    /// Formats the requested attributes, see [`format_connection_info`].
    pub fn connection_info(&self, flags: ConnectionInfoFlags) -> String {
        format_connection_info(&self.details, flags)
    }

    /// Clears the protected connection string and closes the connection.
    ///
    /// Calling it again is a no-op.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.connection_string.clear();
        if let Some(mut connection) = self.connection.take()
            && connection.state() == ConnectionState::Open
            && let Err(e) = connection.close().await
        {
            warn!("Closing the database connection failed: {}", e);
        }

        self.disposed = true;
        debug!("Connector disposed");
    }
}

#[cfg(feature = "mssql")]
impl Connector<TiberiusDriver> {
    /// SQL Server connector for `settings`.
    ///
    /// # Errors
    /// See [`Connector::new`].
    pub fn sql_server(settings: ConnectionSettings) -> Result<Self> {
        Self::new(settings, TiberiusDriver::new())
    }

    /// SQL Server connector using integrated security.
    ///
    /// # Errors
    /// See [`Connector::new`].
    pub fn integrated(server: impl Into<String>, catalog: impl Into<String>) -> Result<Self> {
        Self::sql_server(ConnectionSettings::integrated(server, catalog))
    }

    /// SQL Server connector using a SQL login.
    ///
    /// # Errors
    /// See [`Connector::new`].
    pub fn with_credentials(
        server: impl Into<String>,
        catalog: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<ProtectedSecret>,
    ) -> Result<Self> {
        Self::sql_server(ConnectionSettings::with_credentials(
            server, catalog, user_id, password,
        ))
    }

    /// SQL Server connector for a ready-made connection string.
    ///
    /// # Errors
    /// See [`Connector::from_connection_string`].
    pub fn sql_server_from_connection_string(connection_string: ProtectedSecret) -> Result<Self> {
        Self::from_connection_string(connection_string, TiberiusDriver::new())
    }
}
