//! Managed SQL Server connections with protected connection strings.
//!
//! This crate builds a SQL Server connection string from plain settings,
//! keeps it in memory only in protected form, and opens the physical
//! connection lazily, replacing it whenever it is found closed or broken.
//!
//! # Security Guarantees
//! - Passwords and rendered connection strings are held as [`ProtectedSecret`]
//! - Plaintext copies are zeroized when dropped
//! - Errors, `Debug` output and log events never contain credentials
//!
//! # Architecture
//! - [`ConnectionSettings`] describe the target and authentication
//! - [`Connector`] owns the protected connection string and one connection
//! - [`driver::Driver`] opens physical connections; `tiberius` by default

pub mod connection_string;
pub mod connector;
pub mod driver;
pub mod error;
pub mod info;
pub mod logging;
pub mod security;
pub mod settings;

// Re-export commonly used types
pub use connection_string::ConnectionString;
pub use connector::Connector;
pub use driver::{ConnectionState, Driver, DriverConnection};
pub use error::{ConnectorError, Result};
pub use info::{ConnectionDetails, ConnectionInfoFlags, format_connection_info};
pub use logging::init_logging;
pub use security::{ProtectedSecret, to_plain, to_protected};
pub use settings::{ConnectionSettings, DEFAULT_CONNECT_TIMEOUT_SECS};

#[cfg(feature = "mssql")]
pub use driver::{INTEGRATED_AUTH_AVAILABLE, SqlServerClient, TiberiusConnection, TiberiusDriver};

/// Connector backed by the `tiberius` SQL Server driver.
#[cfg(feature = "mssql")]
pub type SqlServerConnector = Connector<TiberiusDriver>;
