//! External response shapes.
//!
//! Adapters serialize these; the core never touches a raw HTTP
//! response. There is exactly one user-visible failure shape - HTTP 403
//! with a fixed generic body - and the only differentiated signal is
//! the `X-CSRF-Token-Expired: true` header, sent iff the failure reason
//! was expiry so clients know to refresh their token. Internal reason
//! codes never serialize into the body.

use crate::orchestrator::ProtectOutcome;
use serde::Serialize;

/// HTTP status for every denial.
pub const DENIAL_STATUS: u16 = 403;

/// The single user-visible failure message.
pub const DENIAL_MESSAGE: &str = "CSRF validation failed";

/// Header set (with value `"true"`) iff the failure reason was expiry.
pub const EXPIRED_HEADER: &str = "X-CSRF-Token-Expired";

/// The denial body: `{"error":"CSRF validation failed"}`, always.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DenialBody {
    /// Fixed generic message; never a reason code.
    pub error: &'static str,
}

impl Default for DenialBody {
    fn default() -> Self {
        Self {
            error: DENIAL_MESSAGE,
        }
    }
}

/// Everything an adapter needs to write a denial response.
#[derive(Debug, Clone)]
pub struct Denial {
    /// Always [`DENIAL_STATUS`].
    pub status: u16,

    /// Always the generic body.
    pub body: DenialBody,

    /// True iff the adapter should set [`EXPIRED_HEADER`].
    pub expired: bool,
}

/// The denial surface for an outcome, or `None` when the request was
/// allowed.
#[must_use]
pub fn denial_surface(outcome: &ProtectOutcome) -> Option<Denial> {
    match outcome {
        ProtectOutcome::Allowed { .. } => None,
        ProtectOutcome::Denied { expired, .. } => Some(Denial {
            status: DENIAL_STATUS,
            body: DenialBody::default(),
            expired: *expired,
        }),
    }
}

/// Token issuance response: `{"token","expiresAt"}`, plus `"action"`
/// for one-shot tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    /// The base64url token value.
    pub token: String,

    /// Expiry, millisecond epoch.
    pub expires_at: i64,

    /// The bound action string (one-shot tokens only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}
