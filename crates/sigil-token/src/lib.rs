//! sigil token engine.
//!
//! Fixed-layout authenticated tokens with a rotating, domain-separated
//! keyring and a deterministic single-exit validator:
//!
//! - `encoding` - base64url and big-endian layout primitives
//! - `crypto` - the crypto capability trait and its ring-backed default
//! - `context` - length-prefixed context binding hashes
//! - `keyring` - HKDF-derived key entries, rotation window of three
//! - `codec` - wire-format generation and parsing (89 / 120 bytes)
//! - `validator` - constant-time validation for both token kinds
//! - `nonce_cache` - LRU+TTL nonce tracking with atomic consume-or-reject

#![warn(clippy::pedantic)]

pub mod codec;
pub mod context;
pub mod crypto;
pub mod encoding;
pub mod keyring;
pub mod nonce_cache;
pub mod validator;

pub use crypto::{CryptoError, CryptoProvider, RingProvider};
pub use keyring::{KeyDomain, KeyEntry, Keyring};
pub use nonce_cache::{NonceCache, NonceCacheConfig};
pub use validator::Validation;
