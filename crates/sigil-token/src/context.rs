//! Context binding hashes.
//!
//! A context value is a 32-byte digest over an ordered sequence of
//! binding strings (session id, user id, origin, ...). The digest must
//! match between issuance and validation, tying a token to the request
//! attributes it was minted for.
//!
//! Each binding is length-prefixed in ASCII decimal and terminated with
//! a `0x00` byte before hashing, so concatenation cannot collide:
//! `("ab","cd")`, `("a","bcd")`, and `("abcd")` all hash differently,
//! and zero bindings is distinguishable from a single empty binding.

use crate::crypto::CryptoProvider;

/// Context value length in bytes.
pub const CONTEXT_LEN: usize = 32;

/// Hash an ordered sequence of binding strings into a context value.
///
/// Zero bindings yields [`empty_context`]. Binding lengths are measured
/// in bytes.
#[must_use]
pub fn compute_context<P: CryptoProvider + ?Sized>(
    provider: &P,
    bindings: &[&str],
) -> [u8; CONTEXT_LEN] {
    if bindings.is_empty() {
        return empty_context(provider);
    }

    let mut material = Vec::new();
    for binding in bindings {
        material.extend_from_slice(binding.len().to_string().as_bytes());
        material.push(b':');
        material.extend_from_slice(binding.as_bytes());
        material.push(0x00);
    }
    provider.sha256(&material)
}

/// The context value used when a token carries no bindings:
/// `SHA-256(0x00)`.
#[must_use]
pub fn empty_context<P: CryptoProvider + ?Sized>(provider: &P) -> [u8; CONTEXT_LEN] {
    provider.sha256(&[0x00])
}
