//! Crypto capability set: HMAC-SHA256 sign/verify, HKDF-SHA256 key
//! derivation, SHA-256, and a CSPRNG.
//!
//! The engine depends only on the [`CryptoProvider`] trait; the shipped
//! implementation is [`RingProvider`]. MAC verification MUST be
//! constant-time in the tag comparison, which `ring::hmac::verify`
//! guarantees. MACs are never truncated.
//!
//! # Security
//!
//! Error text stays generic: a caller (or a log reader) learns that a
//! derivation failed, never why.

use ring::digest;
use ring::hkdf;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// HMAC-SHA256 tag and derived-key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors from crypto primitives.
///
/// Only derivation and randomness can fail; signing, verification, and
/// hashing are total over their inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// HKDF extract/expand failed.
    #[error("Key derivation failed")]
    DerivationFailed,

    /// The system CSPRNG could not fill the buffer.
    #[error("Random generation failed")]
    RandomFailed,
}

/// Capability set consumed by the token engine.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one
/// provider across concurrent validations.
pub trait CryptoProvider: Send + Sync {
    /// HMAC-SHA256 over `data` with `key`. The full 32-byte tag.
    fn sign(&self, key: &[u8], data: &[u8]) -> [u8; KEY_LEN];

    /// Verify an HMAC-SHA256 tag. Constant-time in the tag comparison.
    fn verify(&self, key: &[u8], mac: &[u8], data: &[u8]) -> bool;

    /// HKDF-SHA256 (extract then expand) from `master` with `salt` and
    /// `info` to a 32-byte HMAC key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DerivationFailed`] if extraction or
    /// expansion fails.
    fn derive_key(
        &self,
        master: &[u8],
        salt: &[u8],
        info: &[u8],
    ) -> Result<[u8; KEY_LEN], CryptoError>;

    /// Fill `dest` with cryptographically secure random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the CSPRNG fails.
    fn random_bytes(&self, dest: &mut [u8]) -> Result<(), CryptoError>;

    /// SHA-256 digest.
    fn sha256(&self, data: &[u8]) -> [u8; KEY_LEN];
}

/// Platform-native provider backed by `ring`.
pub struct RingProvider {
    rng: SystemRandom,
}

impl RingProvider {
    /// Create a provider with the system CSPRNG.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for RingProvider {
    fn sign(&self, key: &[u8], data: &[u8]) -> [u8; KEY_LEN] {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        let tag = hmac::sign(&key, data);

        // HMAC-SHA256 tags are exactly 32 bytes
        let mut mac = [0u8; KEY_LEN];
        mac.copy_from_slice(tag.as_ref());
        mac
    }

    fn verify(&self, key: &[u8], mac: &[u8], data: &[u8]) -> bool {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        hmac::verify(&key, data, mac).is_ok()
    }

    fn derive_key(
        &self,
        master: &[u8],
        salt: &[u8],
        info: &[u8],
    ) -> Result<[u8; KEY_LEN], CryptoError> {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, salt);
        let prk = salt.extract(master);
        let info_slices = [info];
        let okm = prk.expand(&info_slices, hkdf::HKDF_SHA256).map_err(|_| {
            tracing::error!(target: "sigil.crypto", "HKDF expansion failed");
            CryptoError::DerivationFailed
        })?;

        let mut key = [0u8; KEY_LEN];
        okm.fill(&mut key).map_err(|_| {
            tracing::error!(target: "sigil.crypto", "HKDF output fill failed");
            CryptoError::DerivationFailed
        })?;
        Ok(key)
    }

    fn random_bytes(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        self.rng.fill(dest).map_err(|_| {
            tracing::error!(target: "sigil.crypto", "CSPRNG fill failed");
            CryptoError::RandomFailed
        })
    }

    fn sha256(&self, data: &[u8]) -> [u8; KEY_LEN] {
        let digest = digest::digest(&digest::SHA256, data);

        // SHA-256 digests are exactly 32 bytes
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(digest.as_ref());
        out
    }
}

/// Boxed providers forward the capability set, enabling runtime-selected
/// backends (for example a KMS-backed signer) behind one orchestrator
/// type.
#[cfg(feature = "boxed-provider")]
impl CryptoProvider for Box<dyn CryptoProvider> {
    fn sign(&self, key: &[u8], data: &[u8]) -> [u8; KEY_LEN] {
        (**self).sign(key, data)
    }

    fn verify(&self, key: &[u8], mac: &[u8], data: &[u8]) -> bool {
        (**self).verify(key, mac, data)
    }

    fn derive_key(
        &self,
        master: &[u8],
        salt: &[u8],
        info: &[u8],
    ) -> Result<[u8; KEY_LEN], CryptoError> {
        (**self).derive_key(master, salt, info)
    }

    fn random_bytes(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        (**self).random_bytes(dest)
    }

    fn sha256(&self, data: &[u8]) -> [u8; KEY_LEN] {
        (**self).sha256(data)
    }
}
