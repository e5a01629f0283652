//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with
//! sigil-specific guidance. Use these types for all sensitive values:
//! the master secret, derived key material, and anything that must never
//! reach a log line.
//!
//! The key property is that `SecretBox<T>` and `SecretString` implement
//! `Debug` with redaction, so any struct that derives `Debug` while
//! holding a secret gets safe logging behavior for free, and secrets are
//! zeroized on drop.
//!
//! # Usage Guidelines
//!
//! Use `SecretBox<Vec<u8>>` for:
//! - The HKDF master secret
//! - Derived HMAC key material held by keyring entries
//!
//! Use `SecretString` for:
//! - Secrets arriving as configuration strings
//!
//! Accessing the wrapped value always requires an explicit
//! `.expose_secret()` call at the use site.

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
