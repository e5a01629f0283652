//! Domain-separated signing keyrings.
//!
//! Every signing key is derived from one master secret with
//! HKDF-SHA256, salt `"sigil-v1"`, info `"{domain}-signing-key-{kid}"`.
//! Varying the domain in the info string yields independent keys per
//! purpose: a key minted for the `csrf` domain cannot produce valid MACs
//! in the `oneshot` domain (RFC 5869 domain separation).
//!
//! A keyring is an immutable value: rotation derives a new entry,
//! prepends it, truncates to the three-key window, and returns a new
//! ring. Callers that share a ring across threads swap an
//! `Arc<Keyring>` atomically and let in-flight validations finish on
//! their snapshot.

use crate::crypto::{CryptoError, CryptoProvider};
use common::secret::{ExposeSecret, SecretBox};
use std::fmt;

/// Rotation window: tokens signed by keys older than the newest three
/// epochs stop validating.
pub const MAX_KEYRING_KEYS: usize = 3;

/// HKDF salt shared by every derivation. Versioned so a future layout
/// change re-keys the world.
pub const HKDF_SALT: &[u8] = b"sigil-v1";

/// Key derivation domain.
///
/// The domain tag feeds the HKDF info string, separating key purposes
/// derived from the same master secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDomain {
    /// Regular CSRF tokens.
    Csrf,
    /// Single-use action-bound tokens.
    OneShot,
    /// Reserved for internal signing needs.
    Internal,
}

impl KeyDomain {
    /// The domain tag as it appears in HKDF info strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyDomain::Csrf => "csrf",
            KeyDomain::OneShot => "oneshot",
            KeyDomain::Internal => "internal",
        }
    }
}

impl fmt::Display for KeyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One derived signing key, tagged with its 8-bit key id.
///
/// Key material is held in a `SecretBox`: redacted in Debug output and
/// zeroized on drop.
pub struct KeyEntry {
    kid: u8,
    key: SecretBox<Vec<u8>>,
    created_at_ms: i64,
}

impl KeyEntry {
    fn derive<P: CryptoProvider + ?Sized>(
        provider: &P,
        master: &[u8],
        kid: u8,
        domain: KeyDomain,
        created_at_ms: i64,
    ) -> Result<Self, CryptoError> {
        let info = format!("{}-signing-key-{kid}", domain.as_str());
        let key = provider.derive_key(master, HKDF_SALT, info.as_bytes())?;
        Ok(Self {
            kid,
            key: SecretBox::new(Box::new(key.to_vec())),
            created_at_ms,
        })
    }

    /// The 8-bit key id embedded in regular tokens.
    #[must_use]
    pub fn kid(&self) -> u8 {
        self.kid
    }

    /// Raw HMAC key material. 32 bytes.
    #[must_use]
    pub fn key_material(&self) -> &[u8] {
        self.key.expose_secret()
    }

    /// Derivation time, millisecond epoch.
    #[must_use]
    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}

/// Clone implementation that explicitly clones the boxed key material.
impl Clone for KeyEntry {
    fn clone(&self) -> Self {
        Self {
            kid: self.kid,
            key: SecretBox::new(Box::new(self.key.expose_secret().clone())),
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Custom Debug implementation that redacts key material.
impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("kid", &self.kid)
            .field("key", &"[REDACTED]")
            .field("created_at_ms", &self.created_at_ms)
            .finish()
    }
}

/// Ordered ring of signing keys, newest first, at most
/// [`MAX_KEYRING_KEYS`] entries.
///
/// Invariants: all `kid` values distinct; the active kid is present in
/// the ring. Both hold by construction and survive rotation.
#[derive(Debug, Clone)]
pub struct Keyring {
    domain: KeyDomain,
    active_kid: u8,
    entries: Vec<KeyEntry>,
}

impl Keyring {
    /// Create a single-key ring for `domain` with the given key id.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if key derivation fails.
    pub fn create<P: CryptoProvider + ?Sized>(
        provider: &P,
        master: &[u8],
        kid: u8,
        domain: KeyDomain,
    ) -> Result<Self, CryptoError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let entry = KeyEntry::derive(provider, master, kid, domain, now_ms)?;

        tracing::info!(
            target: "sigil.keyring",
            domain = %domain,
            kid = kid,
            "Keyring initialized"
        );

        Ok(Self {
            domain,
            active_kid: kid,
            entries: vec![entry],
        })
    }

    /// Derive a key for `new_kid`, prepend it, and truncate to the
    /// rotation window. Returns the successor ring; `self` is untouched
    /// so in-flight readers keep a consistent snapshot.
    ///
    /// A re-used kid replaces its previous entry rather than duplicating
    /// it, preserving the distinct-kid invariant.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] if key derivation fails.
    pub fn rotate<P: CryptoProvider + ?Sized>(
        &self,
        provider: &P,
        master: &[u8],
        new_kid: u8,
    ) -> Result<Self, CryptoError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let entry = KeyEntry::derive(provider, master, new_kid, self.domain, now_ms)?;

        let mut entries = Vec::with_capacity(MAX_KEYRING_KEYS);
        entries.push(entry);
        entries.extend(
            self.entries
                .iter()
                .filter(|existing| existing.kid != new_kid)
                .cloned(),
        );
        entries.truncate(MAX_KEYRING_KEYS);

        tracing::info!(
            target: "sigil.keyring",
            domain = %self.domain,
            new_kid = new_kid,
            window = entries.len(),
            "Signing key rotated"
        );

        Ok(Self {
            domain: self.domain,
            active_kid: new_kid,
            entries,
        })
    }

    /// Look up a key by id.
    #[must_use]
    pub fn resolve(&self, kid: u8) -> Option<&KeyEntry> {
        self.entries.iter().find(|entry| entry.kid == kid)
    }

    /// The entry whose kid is the ring's active kid.
    #[must_use]
    pub fn active(&self) -> Option<&KeyEntry> {
        self.resolve(self.active_kid)
    }

    /// The active key id.
    #[must_use]
    pub fn active_kid(&self) -> u8 {
        self.active_kid
    }

    /// All entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// The derivation domain this ring is tagged with.
    #[must_use]
    pub fn domain(&self) -> KeyDomain {
        self.domain
    }

    /// Number of keys currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the ring holds no keys. Validation fails closed on an
    /// empty ring.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
