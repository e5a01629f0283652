//! Deterministic token validation.
//!
//! The validator runs every step for every presented token and exits
//! exactly once, so the timing profile does not reveal which check
//! failed:
//!
//! - a failed parse substitutes zeroed parts and keeps going;
//! - an unknown kid still verifies a MAC, against the ring's first key,
//!   so a kid miss is indistinguishable from a kid hit (no kid
//!   enumeration oracle);
//! - context comparison always executes, against a zero buffer when
//!   parsing failed.
//!
//! Each step folds its outcome into a running accumulator; there is no
//! early return. The reported reason is the last step that failed on
//! its own evidence - a step forced down by an earlier failure (a dummy
//! MAC after a parse failure, a forced-false MAC after a kid miss) does
//! not claim the reason, so malformed input reports `parse_failed` and
//! an unknown kid reports `unknown_kid` even though the MAC step still
//! ran.

use crate::codec::{self, OneShotTokenParts, TokenParts};
use crate::context::CONTEXT_LEN;
use crate::crypto::CryptoProvider;
use crate::keyring::Keyring;
use crate::nonce_cache::NonceCache;
use common::Reason;
use subtle::ConstantTimeEq;

/// Outcome of validating one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Every check passed.
    Valid,
    /// At least one check failed; `reason` is internal-only.
    Invalid {
        /// The last check that failed on its own evidence.
        reason: Reason,
    },
}

impl Validation {
    /// True when the token passed every check.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// The failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Validation::Valid => None,
            Validation::Invalid { reason } => Some(reason),
        }
    }
}

/// Constant-time byte equality.
///
/// Folds the length difference and every byte difference (zero-filled
/// past the shorter input) into one accumulator; the scan length depends
/// only on the longer input's length, never on content, and there is no
/// early return on the first differing byte.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        equal &= x.ct_eq(&y);
    }
    equal.into()
}

/// Validate a regular token against a keyring snapshot.
///
/// `ttl_ms` bounds acceptance from issuance; `grace_ms` extends it to
/// cover requests in flight across the TTL boundary. `age == ttl` is
/// within TTL, `age == ttl + grace` is within grace, and a future-dated
/// token (`age < 0`) is expired.
#[must_use]
pub fn validate_at<P: CryptoProvider + ?Sized>(
    provider: &P,
    keyring: &Keyring,
    token: &str,
    expected_context: Option<&[u8; CONTEXT_LEN]>,
    ttl_ms: i64,
    grace_ms: i64,
    now_ms: i64,
) -> Validation {
    let mut valid = true;
    let mut reason = Reason::ParseFailed;

    // Step 1: parse. Zeroed parts stand in after a failure so every
    // later step runs over same-shaped input.
    let parsed = codec::parse(token);
    let parse_ok = parsed.is_some();
    let parts = parsed.unwrap_or_else(TokenParts::zeroed);
    valid &= parse_ok;
    if !parse_ok {
        reason = Reason::ParseFailed;
    }

    // Step 2: resolve the key by kid.
    let resolved = keyring.resolve(parts.kid);
    let key_ok = resolved.is_some();
    valid &= key_ok;
    if parse_ok && !key_ok {
        reason = Reason::UnknownKid;
    }

    // Step 3: TTL window.
    let ttl_ok = within_ttl(parts.timestamp_ms, ttl_ms, grace_ms, now_ms);
    valid &= ttl_ok;
    if parse_ok && !ttl_ok {
        reason = Reason::Expired;
    }

    // Step 4: MAC, always performed. An unknown kid verifies against
    // the ring's first key so the profile matches a kid hit; the result
    // is accepted only when the kid actually resolved. An empty ring
    // has nothing to verify against and fails closed.
    let payload = parts.payload();
    let (mac_ok, mac_miss) = match resolved.or_else(|| keyring.entries().first()) {
        Some(entry) => {
            let verified = provider.verify(entry.key_material(), &parts.mac, &payload);
            (verified && key_ok, parse_ok && key_ok && !verified)
        }
        None => (false, true),
    };
    valid &= mac_ok;
    if mac_miss {
        reason = Reason::InvalidMac;
    }

    // Step 5: context binding. The comparison executes whether or not a
    // binding is expected; after a parse failure it runs against the
    // zeroed context and is forced false.
    let (ctx_ok, ctx_miss) = match expected_context {
        Some(expected) => {
            let matched = constant_time_eq(&parts.context, expected);
            (matched && parse_ok, parse_ok && !matched)
        }
        None => {
            let _ = constant_time_eq(&parts.context, &parts.context);
            (true, false)
        }
    };
    valid &= ctx_ok;
    if ctx_miss {
        reason = Reason::ContextMismatch;
    }

    if valid {
        Validation::Valid
    } else {
        Validation::Invalid { reason }
    }
}

/// Validate a one-shot token and, on success, consume its nonce.
///
/// Every key in the oneshot ring is tried; acceptance is the OR of the
/// outcomes, so the work performed does not depend on which key
/// matches. There is no grace window.
///
/// Nonce consumption is two-phase: the cache lookup executes for every
/// validation, but the consuming write commits only when all
/// cryptographic checks passed - a token failing MAC, action, or
/// context never burns its nonce. When the cache rejects the commit,
/// `nonce_reused` overrides any earlier tag.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn validate_one_shot_at<P: CryptoProvider + ?Sized>(
    provider: &P,
    keyring: &Keyring,
    token: &str,
    expected_action: &str,
    expected_context: Option<&[u8; CONTEXT_LEN]>,
    ttl_ms: i64,
    now_ms: i64,
    cache: &NonceCache,
) -> Validation {
    let mut valid = true;
    let mut reason = Reason::ParseFailed;

    // Step 1: parse.
    let parsed = codec::parse_one_shot(token);
    let parse_ok = parsed.is_some();
    let parts = parsed.unwrap_or_else(OneShotTokenParts::zeroed);
    valid &= parse_ok;
    if !parse_ok {
        reason = Reason::ParseFailed;
    }

    // Step 2: TTL, no grace.
    let ttl_ok = within_ttl(parts.timestamp_ms, ttl_ms, 0, now_ms);
    valid &= ttl_ok;
    if parse_ok && !ttl_ok {
        reason = Reason::Expired;
    }

    // Step 3: MAC over every key in the ring.
    let payload = parts.payload();
    let mut verified_any = false;
    for entry in keyring.entries() {
        verified_any |= provider.verify(entry.key_material(), &parts.mac, &payload);
    }
    let ring_ok = !keyring.is_empty();
    let mac_ok = verified_any && ring_ok;
    valid &= mac_ok;
    if !ring_ok || (parse_ok && !verified_any) {
        reason = Reason::InvalidMac;
    }

    // Step 4: action binding.
    let expected_action_hash = provider.sha256(expected_action.as_bytes());
    let action_matched = constant_time_eq(&parts.action, &expected_action_hash);
    valid &= action_matched && parse_ok;
    if parse_ok && !action_matched {
        reason = Reason::ActionMismatch;
    }

    // Step 5: context binding.
    let (ctx_ok, ctx_miss) = match expected_context {
        Some(expected) => {
            let matched = constant_time_eq(&parts.context, expected);
            (matched && parse_ok, parse_ok && !matched)
        }
        None => {
            let _ = constant_time_eq(&parts.context, &parts.context);
            (true, false)
        }
    };
    valid &= ctx_ok;
    if ctx_miss {
        reason = Reason::ContextMismatch;
    }

    // Step 6: nonce consumption, two-phase. The read leg always
    // executes; the consuming write commits only for a token that
    // passed every cryptographic check.
    let nonce_key = hex::encode(parts.nonce);
    let _probe = cache.has_at(&nonce_key, now_ms);
    let consumed = if valid {
        cache.mark_used_at(&nonce_key, now_ms)
    } else {
        false
    };
    if valid && !consumed {
        reason = Reason::NonceReused;
    }
    valid = valid && consumed;

    if valid {
        Validation::Valid
    } else {
        Validation::Invalid { reason }
    }
}

/// TTL window check over millisecond ages.
///
/// `age` in `[0, ttl]` is fresh, `(ttl, ttl + grace]` is in grace, and
/// everything else - including future-dated tokens - is out.
fn within_ttl(timestamp_ms: u64, ttl_ms: i64, grace_ms: i64, now_ms: i64) -> bool {
    let issued_ms = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    let age = now_ms.checked_sub(issued_ms).unwrap_or(i64::MIN);

    let fresh = age >= 0 && age <= ttl_ms;
    let in_grace = age > ttl_ms && age <= ttl_ms.saturating_add(grace_ms);
    fresh || in_grace
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::context::{compute_context, empty_context};
    use crate::crypto::RingProvider;
    use crate::keyring::KeyDomain;
    use crate::nonce_cache::{NonceCache, NonceCacheConfig};

    const NOW_MS: i64 = 1_700_000_000_000;
    const TTL_MS: i64 = 20 * 60 * 1000;
    const GRACE_MS: i64 = 60 * 1000;

    fn setup() -> (RingProvider, Keyring) {
        let provider = RingProvider::new();
        let master: Vec<u8> = (100u8..132).collect();
        let ring = Keyring::create(&provider, &master, 1, KeyDomain::Csrf).unwrap();
        (provider, ring)
    }

    fn fresh_token(provider: &RingProvider, ring: &Keyring) -> String {
        #[allow(clippy::cast_sign_loss)]
        let issued_at = NOW_MS as u64;
        codec::generate(provider, ring.active().unwrap(), None, issued_at).unwrap()
    }

    // -------------------------------------------------------------------------
    // constant_time_eq Tests
    // -------------------------------------------------------------------------

    /// The constant-time comparison must agree with naive equality on
    /// every input shape.
    #[test]
    fn test_constant_time_eq_agrees_with_naive_equality() {
        let cases: [(&[u8], &[u8]); 7] = [
            (b"", b""),
            (b"a", b"a"),
            (b"a", b"b"),
            (b"abc", b"abc"),
            (b"abc", b"abd"),
            (b"abc", b"abcd"),
            (b"", b"x"),
        ];

        for (a, b) in cases {
            assert_eq!(constant_time_eq(a, b), a == b, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_constant_time_eq_differs_only_in_length() {
        // Same prefix, zero tail: must still be unequal
        assert!(!constant_time_eq(b"abc", b"abc\x00"));
        assert!(!constant_time_eq(b"abc\x00", b"abc"));
    }

    // -------------------------------------------------------------------------
    // Regular Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_fresh_token_validates() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);

        let outcome = validate_at(&provider, &ring, &token, None, TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(outcome, Validation::Valid);
    }

    /// Regular tokens validate repeatedly; single use is the one-shot
    /// kind's job.
    #[test]
    fn test_regular_token_validates_repeatedly() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);

        for _ in 0..3 {
            assert!(validate_at(&provider, &ring, &token, None, TTL_MS, GRACE_MS, NOW_MS)
                .is_valid());
        }
    }

    #[test]
    fn test_malformed_token_reports_parse_failed() {
        let (provider, ring) = setup();

        for garbage in ["", "!!!", "AAAA", &"A".repeat(200)] {
            let outcome =
                validate_at(&provider, &ring, garbage, None, TTL_MS, GRACE_MS, NOW_MS);
            assert_eq!(
                outcome,
                Validation::Invalid {
                    reason: Reason::ParseFailed
                },
                "input {garbage:?}"
            );
        }
    }

    #[test]
    fn test_unknown_kid_reported_over_forced_mac_failure() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);

        // A ring that never held kid 1
        let other_master: Vec<u8> = (200u8..232).collect();
        let other_ring =
            Keyring::create(&provider, &other_master, 9, KeyDomain::Csrf).unwrap();

        let outcome =
            validate_at(&provider, &other_ring, &token, None, TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::UnknownKid
            }
        );
    }

    #[test]
    fn test_tampered_mac_reports_invalid_mac() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);
        let mut parts = codec::parse(&token).unwrap();
        parts.mac = [0xAAu8; 32];
        let forged = codec::serialize(&parts);

        let outcome = validate_at(&provider, &ring, &forged, None, TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::InvalidMac
            }
        );
    }

    /// A pre-rotation token keeps validating while its kid is inside
    /// the three-key window and stops once it rotates out.
    #[test]
    fn test_rotation_window_bounds_acceptance() {
        let (provider, ring) = setup();
        let master: Vec<u8> = (100u8..132).collect();
        let token = fresh_token(&provider, &ring);

        let mut current = ring;
        for kid in [2u8, 3] {
            current = current.rotate(&provider, &master, kid).unwrap();
            assert!(
                validate_at(&provider, &current, &token, None, TTL_MS, GRACE_MS, NOW_MS)
                    .is_valid(),
                "kid 1 still in the window after rotating to {kid}"
            );
        }

        current = current.rotate(&provider, &master, 4).unwrap();
        let outcome =
            validate_at(&provider, &current, &token, None, TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::UnknownKid
            },
            "kid 1 rotated out of the window"
        );
    }

    // -------------------------------------------------------------------------
    // TTL Boundary Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_ttl_boundaries() {
        // age == ttl: fresh
        assert!(within_ttl(1_000, 500, 100, 1_500));
        // age == ttl + grace: in grace
        assert!(within_ttl(1_000, 500, 100, 1_600));
        // age == ttl + grace + 1: expired
        assert!(!within_ttl(1_000, 500, 100, 1_601));
        // future-dated: rejected
        assert!(!within_ttl(1_000, 500, 100, 999));
        // age == 0: fresh
        assert!(within_ttl(1_000, 500, 100, 1_000));
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);

        let outcome = validate_at(
            &provider,
            &ring,
            &token,
            None,
            TTL_MS,
            GRACE_MS,
            NOW_MS + TTL_MS + GRACE_MS + 1,
        );
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::Expired
            }
        );
    }

    #[test]
    fn test_future_dated_token_reports_expired() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);

        let outcome =
            validate_at(&provider, &ring, &token, None, TTL_MS, GRACE_MS, NOW_MS - 1);
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::Expired
            }
        );
    }

    // -------------------------------------------------------------------------
    // Context Binding Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_context_binding_mismatch_and_match() {
        let (provider, ring) = setup();
        let ctx1 = compute_context(&provider, &["session123"]);
        let ctx2 = compute_context(&provider, &["session999"]);

        #[allow(clippy::cast_sign_loss)]
        let token = codec::generate(&provider, ring.active().unwrap(), Some(&ctx1), NOW_MS as u64)
            .unwrap();

        let wrong =
            validate_at(&provider, &ring, &token, Some(&ctx2), TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(
            wrong,
            Validation::Invalid {
                reason: Reason::ContextMismatch
            }
        );

        let right =
            validate_at(&provider, &ring, &token, Some(&ctx1), TTL_MS, GRACE_MS, NOW_MS);
        assert_eq!(right, Validation::Valid);
    }

    /// A token minted with no bindings carries the empty context; any
    /// other expected context must mismatch.
    #[test]
    fn test_unbound_token_rejects_wrong_expected_context() {
        let (provider, ring) = setup();
        let token = fresh_token(&provider, &ring);
        let wrong_ctx = compute_context(&provider, &["somebody-else"]);

        let outcome = validate_at(
            &provider,
            &ring,
            &token,
            Some(&wrong_ctx),
            TTL_MS,
            GRACE_MS,
            NOW_MS,
        );
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::ContextMismatch
            }
        );

        let empty = empty_context(&provider);
        assert!(validate_at(
            &provider,
            &ring,
            &token,
            Some(&empty),
            TTL_MS,
            GRACE_MS,
            NOW_MS
        )
        .is_valid());
    }

    // -------------------------------------------------------------------------
    // One-shot Validation Tests
    // -------------------------------------------------------------------------

    fn oneshot_setup() -> (RingProvider, Keyring, NonceCache) {
        let provider = RingProvider::new();
        let master: Vec<u8> = (100u8..132).collect();
        let ring = Keyring::create(&provider, &master, 1, KeyDomain::OneShot).unwrap();
        let cache = NonceCache::new(NonceCacheConfig::default());
        (provider, ring, cache)
    }

    const OS_TTL_MS: i64 = 5 * 60 * 1000;

    #[test]
    fn test_one_shot_valid_then_replay_rejected() {
        let (provider, ring, cache) = oneshot_setup();
        #[allow(clippy::cast_sign_loss)]
        let token = codec::generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "POST:/api/delete",
            None,
            NOW_MS as u64,
        )
        .unwrap();

        let first = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/api/delete",
            None,
            OS_TTL_MS,
            NOW_MS,
            &cache,
        );
        assert_eq!(first, Validation::Valid);

        let replay = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/api/delete",
            None,
            OS_TTL_MS,
            NOW_MS + 1,
            &cache,
        );
        assert_eq!(
            replay,
            Validation::Invalid {
                reason: Reason::NonceReused
            }
        );
    }

    /// A wrong-action attempt must not burn the nonce: the subsequent
    /// correct-action validation still succeeds.
    #[test]
    fn test_failed_action_does_not_burn_nonce() {
        let (provider, ring, cache) = oneshot_setup();
        #[allow(clippy::cast_sign_loss)]
        let token = codec::generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "POST:/api/delete",
            None,
            NOW_MS as u64,
        )
        .unwrap();

        let wrong = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/api/other",
            None,
            OS_TTL_MS,
            NOW_MS,
            &cache,
        );
        assert_eq!(
            wrong,
            Validation::Invalid {
                reason: Reason::ActionMismatch
            }
        );

        let right = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/api/delete",
            None,
            OS_TTL_MS,
            NOW_MS + 1,
            &cache,
        );
        assert_eq!(right, Validation::Valid);
    }

    /// All keys in the oneshot ring are tried, so a token signed before
    /// a rotation still validates while its key is in the window.
    #[test]
    fn test_one_shot_tries_all_keys_in_window() {
        let (provider, ring, cache) = oneshot_setup();
        let master: Vec<u8> = (100u8..132).collect();
        #[allow(clippy::cast_sign_loss)]
        let token = codec::generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "POST:/x",
            None,
            NOW_MS as u64,
        )
        .unwrap();

        let rotated = ring.rotate(&provider, &master, 2).unwrap();
        let outcome = validate_one_shot_at(
            &provider,
            &rotated,
            &token,
            "POST:/x",
            None,
            OS_TTL_MS,
            NOW_MS + 1,
            &cache,
        );
        assert_eq!(outcome, Validation::Valid);
    }

    #[test]
    fn test_one_shot_has_no_grace_window() {
        let (provider, ring, cache) = oneshot_setup();
        #[allow(clippy::cast_sign_loss)]
        let token = codec::generate_one_shot(
            &provider,
            ring.active().unwrap(),
            "POST:/x",
            None,
            NOW_MS as u64,
        )
        .unwrap();

        let at_ttl = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/x",
            None,
            OS_TTL_MS,
            NOW_MS + OS_TTL_MS,
            &cache,
        );
        assert_eq!(at_ttl, Validation::Valid, "age == ttl is within");

        let cache2 = NonceCache::new(NonceCacheConfig::default());
        let past_ttl = validate_one_shot_at(
            &provider,
            &ring,
            &token,
            "POST:/x",
            None,
            OS_TTL_MS,
            NOW_MS + OS_TTL_MS + 1,
            &cache2,
        );
        assert_eq!(
            past_ttl,
            Validation::Invalid {
                reason: Reason::Expired
            }
        );
    }

    #[test]
    fn test_one_shot_malformed_reports_parse_failed() {
        let (provider, ring, cache) = oneshot_setup();
        let outcome = validate_one_shot_at(
            &provider,
            &ring,
            "garbage",
            "POST:/x",
            None,
            OS_TTL_MS,
            NOW_MS,
            &cache,
        );
        assert_eq!(
            outcome,
            Validation::Invalid {
                reason: Reason::ParseFailed
            }
        );
        assert!(cache.is_empty(), "no nonce recorded for garbage input");
    }
}
