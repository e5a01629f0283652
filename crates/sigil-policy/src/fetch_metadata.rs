//! Fetch-Metadata provenance check.
//!
//! `Sec-Fetch-Site` is set by every modern browser and classifies where
//! a request came from relative to the target: `same-origin`,
//! `same-site`, `cross-site`, or `none` (user-initiated navigation).
//! Cross-site state changes are exactly what CSRF is, so the header is
//! the cheapest and most reliable first layer.
//!
//! Legacy browsers do not send the header. The default `degraded` mode
//! lets those requests through to the other layers (origin check, token
//! check); `strict` mode denies them outright.

use crate::{Policy, Verdict};
use common::{Reason, RequestMetadata};

/// How to treat requests without `Sec-Fetch-Site`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyBrowserMode {
    /// Allow and rely on the remaining layers (default).
    #[default]
    Degraded,
    /// Deny with `fetch_metadata_missing_strict`.
    Strict,
}

/// Fetch-Metadata evaluator.
#[derive(Debug, Clone)]
pub struct FetchMetadataPolicy {
    mode: LegacyBrowserMode,
}

impl FetchMetadataPolicy {
    /// Create an evaluator with the given legacy-browser handling.
    #[must_use]
    pub fn new(mode: LegacyBrowserMode) -> Self {
        Self { mode }
    }
}

impl Policy for FetchMetadataPolicy {
    fn name(&self) -> &'static str {
        "fetch-metadata"
    }

    fn evaluate(&self, metadata: &RequestMetadata) -> Verdict {
        let site = metadata
            .sec_fetch_site
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(site) = site else {
            return match self.mode {
                LegacyBrowserMode::Degraded => Verdict::Allow,
                LegacyBrowserMode::Strict => {
                    Verdict::Deny(Reason::FetchMetadataMissingStrict)
                }
            };
        };

        match site.to_ascii_lowercase().as_str() {
            "same-origin" | "same-site" => Verdict::Allow,
            "cross-site" => Verdict::Deny(Reason::FetchMetadataCrossSite),
            "none" => Verdict::Deny(Reason::FetchMetadataNone),
            other => Verdict::Deny(Reason::FetchMetadataInvalidValue(other.to_string())),
        }
    }
}
