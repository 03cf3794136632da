//! Structured assembly and parsing of ADO.NET style connection strings.
//!
//! Values are quoted according to the ADO.NET rules so that delimiters
//! inside a value (a `;` in a password, leading whitespace, quote
//! characters) survive the round trip through the driver's parser.
//!
//! # Security
//! A `ConnectionString` may hold a password in plaintext. Every entry is
//! zeroed on drop, `Debug` output is redacted, and the rendered form is only
//! available as a `Zeroizing<String>` or as a `ProtectedSecret`.

use crate::{Result, error::ConnectorError, security::ProtectedSecret};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Canonical key names emitted by the builder.
pub mod keys {
    /// Server host or instance
    pub const DATA_SOURCE: &str = "Data Source";
    /// Database selected at connect time
    pub const INITIAL_CATALOG: &str = "Initial Catalog";
    /// Use the caller's ambient identity
    pub const INTEGRATED_SECURITY: &str = "Integrated Security";
    /// SQL login name
    pub const USER_ID: &str = "User ID";
    /// SQL login password
    pub const PASSWORD: &str = "Password";
    /// Client identifier reported to the server
    pub const APPLICATION_NAME: &str = "Application Name";
    /// Seconds to wait for a connection
    pub const CONNECT_TIMEOUT: &str = "Connect Timeout";
    /// Accept the server certificate without validation
    pub const TRUST_SERVER_CERTIFICATE: &str = "TrustServerCertificate";
}

/// Accepted spellings for each logical setting, canonical name first.
pub mod synonyms {
    /// Server host or instance
    pub const DATA_SOURCE: &[&str] = &[
        "data source",
        "server",
        "address",
        "addr",
        "network address",
    ];
    /// Initial database
    pub const INITIAL_CATALOG: &[&str] = &["initial catalog", "database"];
    /// Integrated authentication flag
    pub const INTEGRATED_SECURITY: &[&str] = &[
        "integrated security",
        "integratedsecurity",
        "trusted_connection",
    ];
    /// Login name
    pub const USER_ID: &[&str] = &["user id", "uid", "user", "username"];
    /// Login password
    pub const PASSWORD: &[&str] = &["password", "pwd"];
    /// Connect timeout in seconds
    pub const CONNECT_TIMEOUT: &[&str] = &["connect timeout", "connection timeout", "timeout"];
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Entry {
    key: String,
    value: String,
}

/// Ordered key/value connection string.
///
/// Keys compare case-insensitively; setting an existing key replaces its
/// value in place so the original ordering is preserved.
///
/// # Example
///
/// ```rust
/// use sqlconnector_core::connection_string::{ConnectionString, keys};
///
/// let mut builder = ConnectionString::new();
/// builder.set(keys::DATA_SOURCE, "db1");
/// builder.set(keys::PASSWORD, "a;b");
///
/// assert_eq!(builder.render().as_str(), "Data Source=db1;Password=\"a;b\"");
/// assert_eq!(builder.redacted(), "Data Source=db1;Password=****");
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct ConnectionString {
    entries: Vec<Entry>,
}

impl ConnectionString {
    /// Creates an empty connection string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing an existing entry with the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
        {
            Some(entry) => {
                entry.value.zeroize();
                entry.value = value;
            }
            None => self.entries.push(Entry {
                key: key.to_string(),
                value,
            }),
        }
        self
    }

    /// Looks up the value of `key`, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    /// Returns the value of the first key in `names` that is present.
    pub fn get_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Removes every entry whose key matches one of `names`.
    pub fn remove_any(&mut self, names: &[&str]) {
        self.entries.retain(|entry| {
            !names
                .iter()
                .any(|name| entry.key.eq_ignore_ascii_case(name))
        });
    }

    /// Replaces whichever synonym of a setting is present, or appends the
    /// canonical key when none is.
    pub fn replace_any(&mut self, names: &[&str], canonical: &str, value: impl Into<String>) {
        let key = self
            .entries
            .iter()
            .find(|entry| names.iter().any(|name| entry.key.eq_ignore_ascii_case(name)))
            .map_or_else(|| canonical.to_string(), |entry| entry.key.clone());
        self.set(&key, value);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the connection string has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the connection string, including any password.
    pub fn render(&self) -> Zeroizing<String> {
        let mut rendered = Zeroizing::new(String::new());
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                rendered.push(';');
            }
            push_key(&mut rendered, &entry.key);
            rendered.push('=');
            push_value(&mut rendered, &entry.value);
        }
        rendered
    }

    /// Renders the connection string with password values masked.
    pub fn redacted(&self) -> String {
        let mut masked = self.clone();
        for entry in &mut masked.entries {
            if synonyms::PASSWORD
                .iter()
                .any(|name| entry.key.eq_ignore_ascii_case(name))
            {
                entry.value.zeroize();
                entry.value.push_str("****");
            }
        }
        masked.render().to_string()
    }

    /// Renders straight into a protected secret.
    pub fn to_protected(&self) -> ProtectedSecret {
        ProtectedSecret::from(self.render())
    }

    /// Parses an ADO.NET style connection string.
    ///
    /// Empty segments are skipped. Values may be wrapped in single or double
    /// quotes, with the quote character doubled inside the value.
    ///
    /// # Errors
    /// Returns a `Configuration` error for a key without `=`, an empty key,
    /// an unterminated quote, or trailing text after a quoted value.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parsed = Self::new();
        let mut chars = input.chars().peekable();
        let mut entry = 0usize;

        loop {
            while chars
                .peek()
                .is_some_and(|c| c.is_whitespace() || *c == ';')
            {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }
            entry = entry.saturating_add(1);

            let mut key = String::new();
            loop {
                match chars.next() {
                    // `==` is an escaped `=` inside a key
                    Some('=') if chars.peek() == Some(&'=') => {
                        chars.next();
                        key.push('=');
                    }
                    Some('=') => break,
                    Some(';') | None => {
                        key.zeroize();
                        return Err(ConnectorError::configuration(format!(
                            "entry {entry} has no '=' separator"
                        )));
                    }
                    Some(c) => key.push(c),
                }
            }
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(ConnectorError::configuration(format!(
                    "entry {entry} has an empty key"
                )));
            }

            while chars.peek().is_some_and(|c| c.is_whitespace() && *c != ';') {
                chars.next();
            }

            let mut value = String::new();
            match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    loop {
                        match chars.next() {
                            Some(c) if c == quote && chars.peek() == Some(&quote) => {
                                chars.next();
                                value.push(quote);
                            }
                            Some(c) if c == quote => break,
                            Some(c) => value.push(c),
                            None => {
                                value.zeroize();
                                return Err(ConnectorError::configuration(format!(
                                    "entry {entry} has an unterminated quoted value"
                                )));
                            }
                        }
                    }
                    while chars.peek().is_some_and(|c| c.is_whitespace()) {
                        chars.next();
                    }
                    if chars.peek().is_some_and(|c| *c != ';') {
                        value.zeroize();
                        return Err(ConnectorError::configuration(format!(
                            "entry {entry} has text after its quoted value"
                        )));
                    }
                }
                _ => {
                    while let Some(c) = chars.next_if(|c| *c != ';') {
                        value.push(c);
                    }
                    let trimmed_len = value.trim_end().len();
                    value.truncate(trimmed_len);
                }
            }

            parsed.set(&key, value);
        }

        Ok(parsed)
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString")
            .field(&self.redacted())
            .finish()
    }
}

/// Parses the boolean spellings accepted by SQL Server drivers.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "sspi" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

/// Formats a boolean the way `SqlConnectionStringBuilder` does.
pub const fn format_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn push_key(out: &mut String, key: &str) {
    for c in key.chars() {
        if c == '=' {
            out.push_str("==");
        } else {
            out.push(c);
        }
    }
}

// The driver's lexer treats quotes and braces anywhere in a bare value as
// delimiters and collapses whitespace runs, so any of them forces quoting.
fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, ';' | '=' | '"' | '\'' | '{' | '}') || c.is_whitespace())
}

fn push_value(out: &mut String, value: &str) {
    if !needs_quoting(value) {
        out.push_str(value);
        return;
    }

    if !value.contains('"') {
        out.push('"');
        out.push_str(value);
        out.push('"');
    } else if !value.contains('\'') {
        out.push('\'');
        out.push_str(value);
        out.push('\'');
    } else {
        out.push('"');
        for c in value.chars() {
            if c == '"' {
                out.push_str("\"\"");
            } else {
                out.push(c);
            }
        }
        out.push('"');
    }
}
