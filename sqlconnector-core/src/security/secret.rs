//! Masked in-memory secret with explicit reveal and clear.
//!
//! A `ProtectedSecret` never stores its plaintext. The bytes are XOR-masked
//! with a per-instance random pad, and both buffers are zeroed when the
//! secret is cleared or dropped. The plaintext only exists inside the
//! `Zeroizing<String>` returned by [`ProtectedSecret::reveal`], which wipes
//! itself at the end of the caller's scope.

use crate::{Result, error::ConnectorError};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Opaque secret value resistant to casual in-memory inspection.
///
/// # Example
///
/// ```rust
/// use sqlconnector_core::security::ProtectedSecret;
///
/// let mut secret = ProtectedSecret::new("hunter2");
/// assert_eq!(secret.reveal()?.as_str(), "hunter2");
/// assert_eq!(format!("{secret:?}"), "ProtectedSecret(<redacted>)");
///
/// secret.clear();
/// assert!(secret.reveal().is_err());
/// # Ok::<(), sqlconnector_core::ConnectorError>(())
/// ```
#[derive(Clone)]
pub struct ProtectedSecret {
    masked: Vec<u8>,
    pad: Vec<u8>,
    cleared: bool,
}

impl ProtectedSecret {
    /// Protects a copy of `value`. The caller still owns (and should wipe) the input.
    pub fn new(value: &str) -> Self {
        let plain = value.as_bytes();
        let mut pad = vec![0u8; plain.len()];
        rand::rng().fill_bytes(&mut pad);

        let masked = plain
            .iter()
            .zip(&pad)
            .map(|(byte, key)| byte ^ key)
            .collect();

        Self {
            masked,
            pad,
            cleared: false,
        }
    }

    /// Returns a transient plaintext copy that is zeroed when dropped.
    ///
    /// # Errors
    /// Returns `InvalidArgument` once the secret has been cleared.
    pub fn reveal(&self) -> Result<Zeroizing<String>> {
        if self.cleared {
            return Err(ConnectorError::invalid_argument(
                "secret",
                "secret has already been cleared",
            ));
        }

        let bytes: Vec<u8> = self
            .masked
            .iter()
            .zip(&self.pad)
            .map(|(byte, key)| byte ^ key)
            .collect();

        match String::from_utf8(bytes) {
            Ok(plain) => Ok(Zeroizing::new(plain)),
            Err(error) => {
                let mut bytes = error.into_bytes();
                bytes.zeroize();
                Err(ConnectorError::configuration(
                    "protected secret does not hold valid UTF-8",
                ))
            }
        }
    }

    /// Zeroes the masked value and its pad. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.masked.zeroize();
        self.pad.zeroize();
        self.cleared = true;
    }

    /// Whether [`clear`](Self::clear) has been called.
    pub const fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Length of the protected value in bytes.
    pub fn len(&self) -> usize {
        self.masked.len()
    }

    /// Whether the protected value is the empty string.
    pub fn is_empty(&self) -> bool {
        self.masked.is_empty()
    }
}

impl Drop for ProtectedSecret {
    fn drop(&mut self) {
        self.masked.zeroize();
        self.pad.zeroize();
    }
}

impl fmt::Debug for ProtectedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedSecret(<redacted>)")
    }
}

/// Compares the underlying values without materializing either plaintext.
impl PartialEq for ProtectedSecret {
    fn eq(&self, other: &Self) -> bool {
        if self.cleared || other.cleared {
            return self.cleared == other.cleared;
        }
        if self.masked.len() != other.masked.len() {
            return false;
        }

        let difference = self
            .masked
            .iter()
            .zip(&self.pad)
            .zip(other.masked.iter().zip(&other.pad))
            .fold(0u8, |acc, ((a, a_key), (b, b_key))| {
                acc | ((a ^ a_key) ^ (b ^ b_key))
            });
        difference == 0
    }
}

impl Eq for ProtectedSecret {}

impl From<&str> for ProtectedSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Takes ownership of the plaintext and wipes it after masking.
impl From<String> for ProtectedSecret {
    fn from(value: String) -> Self {
        let value = Zeroizing::new(value);
        Self::new(&value)
    }
}

impl From<Zeroizing<String>> for ProtectedSecret {
    fn from(value: Zeroizing<String>) -> Self {
        Self::new(&value)
    }
}

/// Converts plaintext into a protected secret.
///
/// A zero-length value is valid; only a missing value is rejected.
///
/// # Errors
/// Returns `InvalidArgument` when `value` is `None`.
pub fn to_protected(value: Option<&str>) -> Result<ProtectedSecret> {
    value
        .map(ProtectedSecret::new)
        .ok_or_else(|| ConnectorError::invalid_argument("value", "value must not be absent"))
}

/// Converts a protected secret back into a transient plaintext copy.
///
/// # Errors
/// Returns `InvalidArgument` when `secret` is `None` or has been cleared.
pub fn to_plain(secret: Option<&ProtectedSecret>) -> Result<Zeroizing<String>> {
    secret
        .ok_or_else(|| ConnectorError::invalid_argument("secret", "secret must not be absent"))?
        .reveal()
}
