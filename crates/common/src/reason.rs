//! Internal reason codes for validation and policy decisions.
//!
//! Reasons are carried through result structures and structured logs.
//! They never cross the external boundary: adapters surface a single
//! generic failure body regardless of the reason (see `sigil-guard`),
//! with expiry differentiated only via a response header.
//!
//! # Security
//!
//! Keeping reasons internal prevents an attacker from using the failure
//! mode as an oracle (which key epoch matched, whether the MAC or the
//! context was wrong, whether a nonce was already spent).

use serde::{Serialize, Serializer};
use std::fmt;

/// Internal reason code for a denied or failed operation.
///
/// The `Display` form is the stable snake_case code used in logs and
/// cross-implementation fixtures. Parameterized variants append their
/// detail after a `:` separator (e.g. `origin_mismatch:https://evil.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    // -------------------------------------------------------------------------
    // Token validation
    // -------------------------------------------------------------------------
    /// Token failed base64url decoding or had the wrong byte length.
    ParseFailed,

    /// Token carried a key id not present in the keyring window.
    UnknownKid,

    /// Token age fell outside the TTL and grace window (or was future-dated).
    Expired,

    /// MAC verification failed, or the keyring was empty (fail closed).
    InvalidMac,

    /// Token context hash did not match the expected binding.
    ContextMismatch,

    /// One-shot token action hash did not match the expected action.
    ActionMismatch,

    /// One-shot nonce was already consumed within its TTL.
    NonceReused,

    // -------------------------------------------------------------------------
    // Orchestration
    // -------------------------------------------------------------------------
    /// Protected request carried no token in any accepted transport.
    NoTokenPresent,

    /// Non-browser client rejected because API mode is disabled.
    ApiModeNotAllowed,

    /// One-shot operation requested while the one-shot subsystem is disabled.
    OneShotNotEnabled,

    /// Keyring has no active signing key.
    NoActiveKey,

    /// Policy chain was empty; denied fail-closed.
    EmptyPolicyChain,

    // -------------------------------------------------------------------------
    // Origin / Referer
    // -------------------------------------------------------------------------
    /// Neither Origin nor Referer was present on a gated request.
    OriginMissing,

    /// Origin header did not match any allowed origin.
    OriginMismatch(String),

    /// Referer origin component did not match any allowed origin.
    OriginRefererMismatch(String),

    /// Referer was present but not parseable as a URL.
    OriginRefererInvalid,

    // -------------------------------------------------------------------------
    // Fetch Metadata
    // -------------------------------------------------------------------------
    /// `Sec-Fetch-Site: cross-site`.
    FetchMetadataCrossSite,

    /// `Sec-Fetch-Site: none` (user-initiated navigation, not a same-site fetch).
    FetchMetadataNone,

    /// `Sec-Fetch-Site` absent while strict legacy-browser mode is configured.
    FetchMetadataMissingStrict,

    /// `Sec-Fetch-Site` carried an unrecognized token.
    FetchMetadataInvalidValue(String),

    // -------------------------------------------------------------------------
    // Content-Type
    // -------------------------------------------------------------------------
    /// Content-Type absent or empty on a state-changing request.
    ContentTypeMissingOnStateChange,

    /// Content-Type essence not in the allowed set.
    ContentTypeDisallowed(String),
}

impl Reason {
    /// Whether this reason denotes token expiry.
    ///
    /// Expiry is the one failure mode the external surface is allowed to
    /// differentiate (via the `X-CSRF-Token-Expired` header), so callers
    /// branch on this rather than on the full enumeration.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Reason::Expired)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::ParseFailed => f.write_str("parse_failed"),
            Reason::UnknownKid => f.write_str("unknown_kid"),
            Reason::Expired => f.write_str("expired"),
            Reason::InvalidMac => f.write_str("invalid_mac"),
            Reason::ContextMismatch => f.write_str("context_mismatch"),
            Reason::ActionMismatch => f.write_str("action_mismatch"),
            Reason::NonceReused => f.write_str("nonce_reused"),
            Reason::NoTokenPresent => f.write_str("no_token_present"),
            Reason::ApiModeNotAllowed => f.write_str("api_mode_not_allowed"),
            Reason::OneShotNotEnabled => f.write_str("oneshot_not_enabled"),
            Reason::NoActiveKey => f.write_str("no_active_key"),
            Reason::EmptyPolicyChain => f.write_str("empty_policy_chain"),
            Reason::OriginMissing => f.write_str("origin_missing"),
            Reason::OriginMismatch(origin) => write!(f, "origin_mismatch:{origin}"),
            Reason::OriginRefererMismatch(origin) => {
                write!(f, "origin_referer_mismatch:{origin}")
            }
            Reason::OriginRefererInvalid => f.write_str("origin_referer_invalid"),
            Reason::FetchMetadataCrossSite => f.write_str("fetch_metadata_cross_site"),
            Reason::FetchMetadataNone => f.write_str("fetch_metadata_none"),
            Reason::FetchMetadataMissingStrict => f.write_str("fetch_metadata_missing_strict"),
            Reason::FetchMetadataInvalidValue(value) => {
                write!(f, "fetch_metadata_invalid_value:{value}")
            }
            Reason::ContentTypeMissingOnStateChange => {
                f.write_str("content_type_missing_on_state_change")
            }
            Reason::ContentTypeDisallowed(essence) => {
                write!(f, "content_type_disallowed:{essence}")
            }
        }
    }
}

/// Reasons serialize as their wire code so result structures log cleanly.
impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
