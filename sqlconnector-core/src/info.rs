//! Human-readable summaries of a connector's attributes.

use crate::{
    Result,
    connection_string::{ConnectionString, parse_bool, synonyms},
    error::ConnectorError,
    settings::{ConnectionSettings, DEFAULT_CONNECT_TIMEOUT_SECS},
};
use bitflags::bitflags;
use std::time::Duration;

bitflags! {
    /// Selects which attributes [`format_connection_info`] reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConnectionInfoFlags: u32 {
        /// Name of the data source (server)
        const DATA_SOURCE = 1;
        /// Name of the initial catalog (database)
        const INITIAL_CATALOG = 2;
        /// Name of the user
        const USER = 4;
        /// Integrated security flag
        const INTEGRATED_SECURITY = 8;
        /// Connect timeout
        const CONNECTION_TIMEOUT = 16;
    }
}

/// Credential-free view of what a connector connects to.
///
/// `server` and `catalog` mirror the current target and follow
/// `switch_database`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionDetails {
    /// Current server
    pub server: String,
    /// Current catalog; empty when none is selected
    pub catalog: String,
    /// Configured SQL login, if any
    pub user_id: Option<String>,
    /// Whether integrated security is used
    pub integrated_security: bool,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u32,
}

impl ConnectionDetails {
    /// The connect timeout as a `Duration`.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs as u64)
    }

    /// Reads the details back out of a parsed connection string.
    ///
    /// # Errors
    /// Returns a `Configuration` error if the timeout or integrated security
    /// values are not understood.
    pub fn from_connection_string(parsed: &ConnectionString) -> Result<Self> {
        let integrated_security = match parsed.get_any(synonyms::INTEGRATED_SECURITY) {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConnectorError::configuration(format!(
                    "invalid integrated security value '{value}'"
                ))
            })?,
            None => false,
        };

        let connect_timeout_secs = match parsed.get_any(synonyms::CONNECT_TIMEOUT) {
            Some(value) => value.trim().parse().map_err(|_| {
                ConnectorError::configuration(format!("invalid connect timeout '{value}'"))
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            server: parsed
                .get_any(synonyms::DATA_SOURCE)
                .unwrap_or_default()
                .to_string(),
            catalog: parsed
                .get_any(synonyms::INITIAL_CATALOG)
                .unwrap_or_default()
                .to_string(),
            user_id: parsed
                .get_any(synonyms::USER_ID)
                .filter(|user| !user.is_empty())
                .map(str::to_string),
            integrated_security,
            connect_timeout_secs,
        })
    }
}

impl From<&ConnectionSettings> for ConnectionDetails {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            server: settings.server.clone(),
            catalog: settings.catalog.clone().unwrap_or_default(),
            user_id: settings.user_id.clone().filter(|user| !user.is_empty()),
            integrated_security: settings.integrated_security,
            connect_timeout_secs: settings.connect_timeout_secs,
        }
    }
}

struct InfoField {
    flag: ConnectionInfoFlags,
    render: fn(&ConnectionDetails) -> String,
}

// Canonical output order
const FIELDS: [InfoField; 5] = [
    InfoField {
        flag: ConnectionInfoFlags::DATA_SOURCE,
        render: render_data_source,
    },
    InfoField {
        flag: ConnectionInfoFlags::INITIAL_CATALOG,
        render: render_initial_catalog,
    },
    InfoField {
        flag: ConnectionInfoFlags::USER,
        render: render_user,
    },
    InfoField {
        flag: ConnectionInfoFlags::INTEGRATED_SECURITY,
        render: render_integrated_security,
    },
    InfoField {
        flag: ConnectionInfoFlags::CONNECTION_TIMEOUT,
        render: render_connection_timeout,
    },
];

fn render_data_source(details: &ConnectionDetails) -> String {
    format!("Data source: {}", details.server)
}

fn render_initial_catalog(details: &ConnectionDetails) -> String {
    format!("Initial catalog: {}", details.catalog)
}

fn render_user(details: &ConnectionDetails) -> String {
    format!("User: {}", details.user_id.as_deref().unwrap_or("none"))
}

fn render_integrated_security(details: &ConnectionDetails) -> String {
    format!("Integrated security: {}", details.integrated_security)
}

fn render_connection_timeout(details: &ConnectionDetails) -> String {
    format!("{}s", details.connect_timeout_secs)
}

/// Formats the requested attributes as a `"; "`-joined string.
///
/// Entries always appear in the order data source, catalog, user,
/// integrated security, timeout. An empty selection or one carrying unknown
/// bits yields an empty string.
///
/// # Example
/// ```rust
/// use sqlconnector_core::{ConnectionDetails, ConnectionInfoFlags, format_connection_info};
///
/// let details = ConnectionDetails {
///     server: "db1".to_string(),
///     connect_timeout_secs: 30,
///     ..Default::default()
/// };
///
/// let info = format_connection_info(
///     &details,
///     ConnectionInfoFlags::CONNECTION_TIMEOUT | ConnectionInfoFlags::DATA_SOURCE,
/// );
/// assert_eq!(info, "Data source: db1; 30s");
/// ```
pub fn format_connection_info(details: &ConnectionDetails, flags: ConnectionInfoFlags) -> String {
    if flags.is_empty() || ConnectionInfoFlags::from_bits(flags.bits()).is_none() {
        return String::new();
    }

    FIELDS
        .iter()
        .filter(|field| flags.contains(field.flag))
        .map(|field| (field.render)(details))
        .collect::<Vec<_>>()
        .join("; ")
}
