//! Encoding primitives: base64url per RFC 4648 and fixed-offset
//! big-endian integer layout.
//!
//! Tokens travel as unpadded base64url with the `-`/`_` alphabet. The
//! decoder is padding-indifferent: the wire format never emits `=`, but
//! inbound values that picked up padding in transit still decode, while
//! anything outside the alphabet is rejected.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};

/// URL-safe engine: encode without padding, decode with or without.
const URL_SAFE_TOLERANT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
///
/// Never emits `+`, `/`, or `=`.
#[must_use]
pub fn base64url_encode(data: &[u8]) -> String {
    URL_SAFE_TOLERANT.encode(data)
}

/// Decode base64url, accepting missing padding and rejecting any
/// character outside the `-`/`_` alphabet.
#[must_use]
pub fn base64url_decode(input: &str) -> Option<Vec<u8>> {
    URL_SAFE_TOLERANT.decode(input).ok()
}

/// Write `value` big-endian into 8 bytes at `offset`.
///
/// Returns `None` when the window does not fit, leaving `buf` untouched.
pub fn write_u64_be(buf: &mut [u8], offset: usize, value: u64) -> Option<()> {
    let end = offset.checked_add(8)?;
    let window = buf.get_mut(offset..end)?;
    window.copy_from_slice(&value.to_be_bytes());
    Some(())
}

/// Read a big-endian u64 from 8 bytes at `offset`.
#[must_use]
pub fn read_u64_be(buf: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let window: [u8; 8] = buf.get(offset..end)?.try_into().ok()?;
    Some(u64::from_be_bytes(window))
}

/// Concatenate byte slices into a single contiguous buffer.
#[must_use]
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|part| part.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}
