//! Origin / Referer provenance check.
//!
//! Allowed origins are normalized by URL parse at construction time;
//! entries that do not parse (or have no tuple origin) are discarded
//! with a warning rather than silently matching nothing. Incoming
//! origins go through the same normalization, so `https://example.com`
//! and `https://example.com:443/` compare equal.
//!
//! The literal string `"null"` - which browsers send for sandboxed and
//! opaque contexts - is not parseable as a URL and therefore can never
//! match an allowed origin.
//!
//! When the Origin header is absent the Referer's origin component is
//! checked instead; when both are absent the request is denied.

use crate::{Policy, Verdict};
use common::{Reason, RequestMetadata};
use url::{Origin, Url};

/// Origin/Referer evaluator over a normalized allow-set.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Build the allow-set, normalizing each configured origin and
    /// discarding entries that cannot be parsed.
    #[must_use]
    pub fn new(allowed_origins: &[String]) -> Self {
        let mut allowed = Vec::with_capacity(allowed_origins.len());
        for candidate in allowed_origins {
            match Self::normalize(candidate) {
                Some(origin) => allowed.push(origin),
                None => {
                    tracing::warn!(
                        target: "sigil.policy",
                        origin = %candidate,
                        "Discarding unparseable allowed origin"
                    );
                }
            }
        }
        Self { allowed }
    }

    /// Number of usable allowed origins after normalization.
    #[must_use]
    pub fn allowed_len(&self) -> usize {
        self.allowed.len()
    }

    /// Parse a URL and render its tuple origin in ASCII serialization.
    /// Opaque origins (including the literal `"null"`) yield `None`.
    fn normalize(value: &str) -> Option<String> {
        let url = Url::parse(value).ok()?;
        match url.origin() {
            origin @ Origin::Tuple(..) => Some(origin.ascii_serialization()),
            Origin::Opaque(_) => None,
        }
    }

    fn is_allowed(&self, normalized: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == normalized)
    }
}

impl Policy for OriginPolicy {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn evaluate(&self, metadata: &RequestMetadata) -> Verdict {
        let origin = metadata
            .origin
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let referer = metadata
            .referer
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if let Some(origin) = origin {
            return match Self::normalize(origin) {
                Some(normalized) if self.is_allowed(&normalized) => Verdict::Allow,
                // Unparseable origins (the literal "null" included) land
                // here and can never match.
                _ => Verdict::Deny(Reason::OriginMismatch(origin.to_string())),
            };
        }

        if let Some(referer) = referer {
            return match Self::normalize(referer) {
                Some(normalized) if self.is_allowed(&normalized) => Verdict::Allow,
                Some(normalized) => Verdict::Deny(Reason::OriginRefererMismatch(normalized)),
                None => Verdict::Deny(Reason::OriginRefererInvalid),
            };
        }

        Verdict::Deny(Reason::OriginMissing)
    }
}
