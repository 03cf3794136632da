//! Driver traits for the physical database connection.
//!
//! The connector never speaks a wire protocol itself. It hands the rendered
//! connection string to a [`Driver`] and manages the [`DriverConnection`]
//! it gets back.
//!
//! # Module Structure
//! - `mssql`: SQL Server driver built on `tiberius` (feature `mssql`)

use crate::Result;
use async_trait::async_trait;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "mssql")]
pub use mssql::{INTEGRATED_AUTH_AVAILABLE, SqlServerClient, TiberiusConnection, TiberiusDriver};

/// Observable state of a physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Ready for use
    Open,
    /// Closed by the caller
    Closed,
    /// Failed at the transport level and cannot be reused
    Broken,
}

impl ConnectionState {
    /// Whether a connection in this state has to be replaced before use.
    pub const fn needs_reconnect(self) -> bool {
        matches!(self, Self::Closed | Self::Broken)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Broken => write!(f, "broken"),
        }
    }
}

/// Opens physical connections from a connection string.
///
/// # Security
/// Implementations receive the plaintext connection string and must not
/// log it or keep a copy beyond what the underlying client requires.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Connection handle produced by this driver.
    type Connection: DriverConnection;

    /// Opens and returns a ready-to-use connection.
    ///
    /// # Errors
    /// Returns a `Configuration` error for a string the driver cannot use,
    /// such as one requesting an authentication mode this build lacks, and a
    /// `Connection` error carrying the driver's own error as source otherwise.
    async fn open(&self, connection_string: &str) -> Result<Self::Connection>;
}

/// A physical connection managed by the connector.
#[async_trait]
pub trait DriverConnection: Send {
    /// Current state of the connection.
    fn state(&self) -> ConnectionState;

    /// Makes `database` the active catalog.
    ///
    /// # Errors
    /// Returns a `Connection` error if the server rejects the switch or the
    /// transport fails.
    async fn change_database(&mut self, database: &str) -> Result<()>;

    /// Closes the connection. Closing an already closed connection succeeds.
    ///
    /// # Errors
    /// Returns a `Connection` error if the graceful shutdown fails; the
    /// connection is considered closed either way.
    async fn close(&mut self) -> Result<()>;
}
