//! Security utilities for credential protection.
//!
//! This module provides the protected secret used for passwords and built
//! connection strings, plus the two conversions between plaintext and
//! protected form.
//!
//! # Security Guarantees
//! - Secrets are masked in memory and zeroed on clear and on drop
//! - Plaintext copies are `Zeroizing` and live only at their use site
//! - Debug output never shows secret content

mod secret;

// Re-export public types
pub use secret::{ProtectedSecret, to_plain, to_protected};
