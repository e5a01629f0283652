//! Token wire formats.
//!
//! Two fixed-size layouts, base64url-encoded on the wire:
//!
//! - Regular (89 bytes): `kid(1) || nonce(16) || ts_ms(8 BE) || ctx(32) || mac(32)`
//! - One-shot (120 bytes): `nonce(16) || ts_ms(8 BE) || action_sha256(32) || ctx(32) || mac(32)`
//!
//! The MAC covers every byte before it. Parsing slices at fixed offsets
//! and never reads a length field from the token: a decoded value of any
//! other size is rejected before anything else looks at it.

use crate::context::{self, CONTEXT_LEN};
use crate::crypto::{CryptoError, CryptoProvider};
use crate::encoding;
use crate::keyring::KeyEntry;

/// Regular token length after base64url decoding.
pub const TOKEN_LEN: usize = 89;

/// One-shot token length after base64url decoding.
pub const ONE_SHOT_TOKEN_LEN: usize = 120;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;

/// MAC length in bytes (full HMAC-SHA256 tag, never truncated).
pub const MAC_LEN: usize = 32;

/// Action hash length in bytes (SHA-256 of the action string).
pub const ACTION_LEN: usize = 32;

// Regular layout offsets.
const NONCE_OFFSET: usize = 1;
const TS_OFFSET: usize = 17;
const CTX_OFFSET: usize = 25;
const MAC_OFFSET: usize = 57;

// One-shot layout offsets.
const OS_TS_OFFSET: usize = 16;
const OS_ACTION_OFFSET: usize = 24;
const OS_CTX_OFFSET: usize = 56;
const OS_MAC_OFFSET: usize = 88;

/// Decoded regular token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts {
    /// Key id the token was signed under.
    pub kid: u8,
    /// Random per-token nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Issuance time, millisecond epoch.
    pub timestamp_ms: u64,
    /// Context binding hash.
    pub context: [u8; CONTEXT_LEN],
    /// HMAC-SHA256 over the payload bytes.
    pub mac: [u8; MAC_LEN],
}

impl TokenParts {
    /// All-zero parts. The validator substitutes these after a parse
    /// failure so every later step runs over same-shaped input.
    #[must_use]
    pub(crate) fn zeroed() -> Self {
        Self {
            kid: 0,
            nonce: [0u8; NONCE_LEN],
            timestamp_ms: 0,
            context: [0u8; CONTEXT_LEN],
            mac: [0u8; MAC_LEN],
        }
    }

    /// The MAC'd payload bytes: everything before the MAC.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        encoding::concat(&[
            &[self.kid],
            &self.nonce,
            &self.timestamp_ms.to_be_bytes(),
            &self.context,
        ])
    }
}

/// Decoded one-shot token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotTokenParts {
    /// Random per-token nonce, consumed on successful validation.
    pub nonce: [u8; NONCE_LEN],
    /// Issuance time, millisecond epoch.
    pub timestamp_ms: u64,
    /// SHA-256 of the bound action string.
    pub action: [u8; ACTION_LEN],
    /// Context binding hash.
    pub context: [u8; CONTEXT_LEN],
    /// HMAC-SHA256 over the payload bytes.
    pub mac: [u8; MAC_LEN],
}

impl OneShotTokenParts {
    /// All-zero parts for the validator's parse-failure leg.
    #[must_use]
    pub(crate) fn zeroed() -> Self {
        Self {
            nonce: [0u8; NONCE_LEN],
            timestamp_ms: 0,
            action: [0u8; ACTION_LEN],
            context: [0u8; CONTEXT_LEN],
            mac: [0u8; MAC_LEN],
        }
    }

    /// The MAC'd payload bytes: everything before the MAC.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        encoding::concat(&[
            &self.nonce,
            &self.timestamp_ms.to_be_bytes(),
            &self.action,
            &self.context,
        ])
    }
}

/// Generate a regular token under `key` at `now_ms`.
///
/// A missing context hashes as the empty context, so issuance and
/// validation agree on unbound tokens.
///
/// # Errors
///
/// Returns [`CryptoError`] if the CSPRNG fails; layout assembly itself
/// is infallible for in-range inputs.
pub fn generate<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &KeyEntry,
    context: Option<&[u8; CONTEXT_LEN]>,
    now_ms: u64,
) -> Result<String, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    provider.random_bytes(&mut nonce)?;

    let parts = TokenParts {
        kid: key.kid(),
        nonce,
        timestamp_ms: now_ms,
        context: context
            .copied()
            .unwrap_or_else(|| context::empty_context(provider)),
        mac: [0u8; MAC_LEN],
    };

    let payload = parts.payload();
    let mac = provider.sign(key.key_material(), &payload);
    Ok(encoding::base64url_encode(&encoding::concat(&[
        &payload, &mac,
    ])))
}

/// Parse a regular token. Returns `None` on any decode or length
/// failure.
#[must_use]
pub fn parse(token: &str) -> Option<TokenParts> {
    let bytes = encoding::base64url_decode(token)?;
    if bytes.len() != TOKEN_LEN {
        return None;
    }

    Some(TokenParts {
        kid: *bytes.first()?,
        nonce: fixed(&bytes, NONCE_OFFSET)?,
        timestamp_ms: encoding::read_u64_be(&bytes, TS_OFFSET)?,
        context: fixed(&bytes, CTX_OFFSET)?,
        mac: fixed(&bytes, MAC_OFFSET)?,
    })
}

/// Deterministically reassemble a regular token from its components.
///
/// Used by tests and cross-implementation fixtures; `parse` followed by
/// `serialize` reproduces the input token byte for byte.
#[must_use]
pub fn serialize(parts: &TokenParts) -> String {
    encoding::base64url_encode(&encoding::concat(&[&parts.payload(), &parts.mac]))
}

/// Generate a one-shot token bound to `action` under `key` at `now_ms`.
///
/// # Errors
///
/// Returns [`CryptoError`] if the CSPRNG fails.
pub fn generate_one_shot<P: CryptoProvider + ?Sized>(
    provider: &P,
    key: &KeyEntry,
    action: &str,
    context: Option<&[u8; CONTEXT_LEN]>,
    now_ms: u64,
) -> Result<String, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    provider.random_bytes(&mut nonce)?;

    let parts = OneShotTokenParts {
        nonce,
        timestamp_ms: now_ms,
        action: provider.sha256(action.as_bytes()),
        context: context
            .copied()
            .unwrap_or_else(|| context::empty_context(provider)),
        mac: [0u8; MAC_LEN],
    };

    let payload = parts.payload();
    let mac = provider.sign(key.key_material(), &payload);
    Ok(encoding::base64url_encode(&encoding::concat(&[
        &payload, &mac,
    ])))
}

/// Parse a one-shot token. Returns `None` on any decode or length
/// failure.
#[must_use]
pub fn parse_one_shot(token: &str) -> Option<OneShotTokenParts> {
    let bytes = encoding::base64url_decode(token)?;
    if bytes.len() != ONE_SHOT_TOKEN_LEN {
        return None;
    }

    Some(OneShotTokenParts {
        nonce: fixed(&bytes, 0)?,
        timestamp_ms: encoding::read_u64_be(&bytes, OS_TS_OFFSET)?,
        action: fixed(&bytes, OS_ACTION_OFFSET)?,
        context: fixed(&bytes, OS_CTX_OFFSET)?,
        mac: fixed(&bytes, OS_MAC_OFFSET)?,
    })
}

/// Deterministically reassemble a one-shot token from its components.
#[must_use]
pub fn serialize_one_shot(parts: &OneShotTokenParts) -> String {
    encoding::base64url_encode(&encoding::concat(&[&parts.payload(), &parts.mac]))
}

/// Copy `N` bytes at `offset` into a fixed array.
fn fixed<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes
        .get(offset..offset.checked_add(N)?)?
        .try_into()
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crypto::RingProvider;
    use crate::keyring::{KeyDomain, KeyEntry, Keyring};

    const NOW_MS: u64 = 1_700_000_000_000;

    fn test_key() -> (RingProvider, Keyring) {
        let provider = RingProvider::new();
        let master: Vec<u8> = (0u8..32).collect();
        let ring = Keyring::create(&provider, &master, 1, KeyDomain::Csrf).unwrap();
        (provider, ring)
    }

    // -------------------------------------------------------------------------
    // Regular Token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_generate_parse_round_trip() {
        let (provider, ring) = test_key();
        let key = ring.active().unwrap();

        let token = codec_generate(&provider, key);
        let parts = parse(&token).unwrap();

        assert_eq!(parts.kid, 1);
        assert_eq!(parts.timestamp_ms, NOW_MS);
        assert_eq!(parts.context, crate::context::empty_context(&provider));
        assert_eq!(parts.nonce.len(), NONCE_LEN);
        assert_eq!(parts.mac.len(), MAC_LEN);
    }

    fn codec_generate(provider: &RingProvider, key: &KeyEntry) -> String {
        generate(provider, key, None, NOW_MS).unwrap()
    }

    #[test]
    fn test_decoded_length_is_exactly_89() {
        let (provider, ring) = test_key();
        let token = codec_generate(&provider, ring.active().unwrap());
        let bytes = encoding::base64url_decode(&token).unwrap();
        assert_eq!(bytes.len(), TOKEN_LEN);
    }

    #[test]
    fn test_layout_offsets() {
        let (provider, ring) = test_key();
        let token = codec_generate(&provider, ring.active().unwrap());
        let bytes = encoding::base64url_decode(&token).unwrap();

        // kid at byte 0
        assert_eq!(bytes.first(), Some(&0x01));
        // timestamp big-endian at bytes [17..25)
        assert_eq!(encoding::read_u64_be(&bytes, 17), Some(NOW_MS));
    }

    #[test]
    fn test_mac_covers_payload() {
        let (provider, ring) = test_key();
        let key = ring.active().unwrap();
        let token = codec_generate(&provider, key);
        let parts = parse(&token).unwrap();

        assert!(provider.verify(key.key_material(), &parts.mac, &parts.payload()));
    }

    #[test]
    fn test_explicit_context_is_embedded() {
        let (provider, ring) = test_key();
        let ctx = crate::context::compute_context(&provider, &["session123"]);

        let token = generate(&provider, ring.active().unwrap(), Some(&ctx), NOW_MS).unwrap();
        assert_eq!(parse(&token).unwrap().context, ctx);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let short = encoding::base64url_encode(&[0u8; TOKEN_LEN - 1]);
        let long = encoding::base64url_encode(&[0u8; TOKEN_LEN + 1]);
        assert!(parse(&short).is_none());
        assert!(parse(&long).is_none());
    }

    #[test]
    fn test_parse_rejects_invalid_base64() {
        assert!(parse("!!!not-base64url!!!").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_serialize_reproduces_token() {
        let (provider, ring) = test_key();
        let token = codec_generate(&provider, ring.active().unwrap());
        let parts = parse(&token).unwrap();
        assert_eq!(serialize(&parts), token);
    }

    // -------------------------------------------------------------------------
    // One-shot Token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_one_shot_round_trip_and_length() {
        let (provider, ring) = test_key();
        let key = ring.active().unwrap();

        let token =
            generate_one_shot(&provider, key, "POST:/api/delete", None, NOW_MS).unwrap();
        let bytes = encoding::base64url_decode(&token).unwrap();
        assert_eq!(bytes.len(), ONE_SHOT_TOKEN_LEN);

        let parts = parse_one_shot(&token).unwrap();
        assert_eq!(parts.timestamp_ms, NOW_MS);
        assert_eq!(parts.action, provider.sha256(b"POST:/api/delete"));
        assert!(provider.verify(key.key_material(), &parts.mac, &parts.payload()));
    }

    #[test]
    fn test_one_shot_parse_rejects_regular_length() {
        let (provider, ring) = test_key();
        let regular = codec_generate(&provider, ring.active().unwrap());
        assert!(parse_one_shot(&regular).is_none());
    }

    #[test]
    fn test_regular_parse_rejects_one_shot_length() {
        let (provider, ring) = test_key();
        let one_shot = generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "POST:/x",
            None,
            NOW_MS,
        )
        .unwrap();
        assert!(parse(&one_shot).is_none());
    }

    #[test]
    fn test_one_shot_serialize_reproduces_token() {
        let (provider, ring) = test_key();
        let token = generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "DELETE:/thing/9",
            None,
            NOW_MS,
        )
        .unwrap();
        let parts = parse_one_shot(&token).unwrap();
        assert_eq!(serialize_one_shot(&parts), token);
    }
}
