//! Connection settings and connection string construction.
//!
//! `ConnectionSettings` is a plain record. Nothing here is validated: an
//! empty server or a credential-less SQL login are accepted and only
//! surface as a failure when the driver tries to connect.

use crate::{
    Result,
    connection_string::{ConnectionString, format_bool, keys},
    security::ProtectedSecret,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 15;

/// Settings needed to build a SQL Server connection string.
///
/// # Security
/// The password is held in a [`ProtectedSecret`] and is never serialized.
/// `Display` omits both user and password.
///
/// # Example
/// ```rust
/// use sqlconnector_core::ConnectionSettings;
///
/// let settings = ConnectionSettings::with_credentials("db1", "orders", "app", "s3cret")
///     .with_application_name("billing")
///     .with_connect_timeout(30);
///
/// assert!(!settings.integrated_security);
/// assert_eq!(settings.connect_timeout_secs, 30);
/// assert_eq!(settings.to_string(), "ConnectionSettings(db1/orders, sql login)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Host or instance name (`host`, `host,port` or `host\INSTANCE`)
    pub server: String,
    /// Initial database
    pub catalog: Option<String>,
    /// SQL login name; ignored under integrated security
    pub user_id: Option<String>,
    /// SQL login password; ignored under integrated security
    #[serde(skip)]
    pub password: Option<ProtectedSecret>,
    /// Use the caller's ambient identity instead of a SQL login
    pub integrated_security: bool,
    /// Client identifier reported to the server
    pub application_name: Option<String>,
    /// Seconds to wait for a connection; `0` waits indefinitely
    pub connect_timeout_secs: u32,
    /// Accept the server certificate without validation
    pub trust_server_certificate: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            catalog: None,
            user_id: None,
            password: None,
            integrated_security: false,
            application_name: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            trust_server_certificate: false,
        }
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionSettings({}{}, {})",
            self.server,
            self.catalog
                .as_ref()
                .map_or_else(String::new, |catalog| format!("/{catalog}")),
            if self.integrated_security {
                "integrated security"
            } else {
                "sql login"
            }
        )
        // Intentionally omit user and never include credentials
    }
}

impl ConnectionSettings {
    /// Settings that authenticate with the caller's ambient identity.
    pub fn integrated(server: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            catalog: Some(catalog.into()),
            integrated_security: true,
            ..Default::default()
        }
    }

    /// Settings that authenticate with a SQL login.
    ///
    /// `password` may be plaintext or an already protected secret; either
    /// way it is stored protected.
    pub fn with_credentials(
        server: impl Into<String>,
        catalog: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<ProtectedSecret>,
    ) -> Self {
        Self {
            server: server.into(),
            catalog: Some(catalog.into()),
            user_id: Some(user_id.into()),
            password: Some(password.into()),
            integrated_security: false,
            ..Default::default()
        }
    }

    /// Builder method to set the application name.
    pub fn with_application_name(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = Some(application_name.into());
        self
    }

    /// Builder method to set the connect timeout in seconds.
    pub const fn with_connect_timeout(mut self, seconds: u32) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Builder method to trust the server certificate.
    pub const fn with_trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// The connect timeout as a `Duration`.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs as u64)
    }

    /// Assembles the connection string for these settings.
    ///
    /// Under integrated security the user and password are left out; for a
    /// SQL login the integrated security flag is left out instead.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the stored password has been cleared.
    pub fn to_connection_string(&self) -> Result<ConnectionString> {
        let mut builder = ConnectionString::new();
        builder.set(keys::DATA_SOURCE, self.server.as_str());

        if let Some(catalog) = self.catalog.as_deref().filter(|c| !c.is_empty()) {
            builder.set(keys::INITIAL_CATALOG, catalog);
        }

        if self.integrated_security {
            builder.set(keys::INTEGRATED_SECURITY, format_bool(true));
        } else {
            builder.set(keys::USER_ID, self.user_id.as_deref().unwrap_or_default());
            if let Some(password) = &self.password {
                let plain = password.reveal()?;
                builder.set(keys::PASSWORD, plain.as_str());
            }
        }

        if let Some(name) = self.application_name.as_deref().filter(|n| !n.is_empty()) {
            builder.set(keys::APPLICATION_NAME, name);
        }

        builder.set(keys::CONNECT_TIMEOUT, self.connect_timeout_secs.to_string());

        if self.trust_server_certificate {
            builder.set(keys::TRUST_SERVER_CERTIFICATE, format_bool(true));
        }

        Ok(builder)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = ConnectionSettings::default();
        assert!(settings.server.is_empty());
        assert_eq!(settings.catalog, None);
        assert!(!settings.integrated_security);
        assert_eq!(settings.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_settings_integrated() {
        let settings = ConnectionSettings::integrated("db1", "orders");
        assert_eq!(settings.server, "db1");
        assert_eq!(settings.catalog.as_deref(), Some("orders"));
        assert!(settings.integrated_security);
        assert_eq!(settings.user_id, None);
        assert!(settings.password.is_none());
    }

    #[test]
    fn test_settings_credentials_accept_protected_password() {
        let protected = ProtectedSecret::new("s3cret");
        let settings = ConnectionSettings::with_credentials("db1", "orders", "app", protected);

        assert!(!settings.integrated_security);
        assert_eq!(settings.user_id.as_deref(), Some("app"));
        assert_eq!(
            settings.password.as_ref().unwrap().reveal().unwrap().as_str(),
            "s3cret"
        );
    }

    #[test]
    fn test_integrated_connection_string_omits_credentials() {
        let mut settings = ConnectionSettings::integrated("db1", "orders")
            .with_application_name("billing")
            .with_connect_timeout(30);
        settings.user_id = Some("ignored".to_string());
        settings.password = Some(ProtectedSecret::new("ignored-too"));

        let rendered = settings.to_connection_string().unwrap().render();
        assert_eq!(
            rendered.as_str(),
            "Data Source=db1;Initial Catalog=orders;Integrated Security=True;\
             Application Name=billing;Connect Timeout=30"
        );
    }

    #[test]
    fn test_credential_connection_string_omits_integrated_flag() {
        let settings = ConnectionSettings::with_credentials("db1", "orders", "app", "pa;ss");

        let rendered = settings.to_connection_string().unwrap().render();
        assert_eq!(
            rendered.as_str(),
            "Data Source=db1;Initial Catalog=orders;User ID=app;Password=\"pa;ss\";\
             Connect Timeout=15"
        );
        assert!(!rendered.contains("Integrated Security"));
    }

    #[test]
    fn test_connection_string_reflects_incomplete_settings() {
        // No validation: a SQL login without user or password still builds
        let settings = ConnectionSettings {
            server: "db1".to_string(),
            ..Default::default()
        };

        let rendered = settings.to_connection_string().unwrap().render();
        assert_eq!(rendered.as_str(), "Data Source=db1;User ID=;Connect Timeout=15");
    }

    #[test]
    fn test_connection_string_trust_server_certificate() {
        let settings =
            ConnectionSettings::integrated("db1", "orders").with_trust_server_certificate(true);

        let rendered = settings.to_connection_string().unwrap().render();
        assert!(rendered.ends_with(";TrustServerCertificate=True"));
    }

    #[test]
    fn test_connection_string_cleared_password_fails() {
        let mut password = ProtectedSecret::new("s3cret");
        password.clear();
        let settings = ConnectionSettings::with_credentials("db1", "orders", "app", password);

        let error = settings.to_connection_string().unwrap_err();
        assert!(error.is_invalid_argument());
    }

    #[test]
    fn test_settings_display_no_credentials() {
        let settings = ConnectionSettings::with_credentials("db1", "orders", "testuser", "s3cret");
        let display = settings.to_string();

        assert!(display.contains("db1/orders"));
        assert!(!display.contains("testuser"));
        assert!(!display.contains("s3cret"));
    }

    #[test]
    fn test_settings_serialization_skips_password() {
        let settings = ConnectionSettings::with_credentials("db1", "orders", "app", "s3cret");
        let json = serde_json::to_string(&settings).unwrap();

        assert!(json.contains("\"server\":\"db1\""));
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_settings_deserialization_defaults() {
        let settings: ConnectionSettings =
            serde_json::from_str(r#"{"server":"db1","integrated_security":true}"#).unwrap();

        assert_eq!(settings.server, "db1");
        assert!(settings.integrated_security);
        assert_eq!(settings.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(settings.password.is_none());
    }
}
