//! Error types with credential sanitization.
//!
//! No variant of [`ConnectorError`] ever carries a password or a complete
//! connection string. Driver failures keep their original error as the
//! `source` so callers can inspect it unchanged.

use std::time::Duration;
use thiserror::Error;

/// Main error type for connector operations.
///
/// # Security
/// All error messages are sanitized to prevent credential leakage.
/// Connection strings and passwords are never included in error output.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A required argument was missing or empty
    #[error("Invalid argument '{parameter}': {message}")]
    InvalidArgument {
        parameter: &'static str,
        message: String,
    },

    /// Opening or using the physical connection failed (credentials sanitized)
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The connect attempt exceeded the configured timeout
    #[error("Connection attempt timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// Malformed configuration or connection string
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The connector was used after `dispose`
    #[error("Connector has already been disposed")]
    Disposed,
}

/// Convenience type alias for Results with ConnectorError
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl ConnectorError {
    /// Creates an invalid argument error for the named parameter
    pub fn invalid_argument(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            message: message.into(),
        }
    }

    /// Creates a connection error with sanitized context, keeping the
    /// driver error as the source.
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for errors raised before any I/O was attempted.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Safely redacts an ADO.NET style connection string for logging.
///
/// `Password` and `Pwd` values are replaced by `****`. Strings that cannot be
/// parsed are replaced entirely, since their layout is unknown.
///
/// # Example
///
/// ```rust
/// use sqlconnector_core::error::redact_connection_string;
///
/// let sanitized = redact_connection_string("Data Source=db1;User ID=sa;Password=secret");
/// assert_eq!(sanitized, "Data Source=db1;User ID=sa;Password=****");
/// assert!(!sanitized.contains("secret"));
/// ```
pub fn redact_connection_string(connection_string: &str) -> String {
    match crate::connection_string::ConnectionString::parse(connection_string) {
        Ok(parsed) => parsed.redacted(),
        Err(_) => "<redacted>".to_string(),
    }
}
