//! Content-Type gating.
//!
//! A state-changing request must declare one of the content types a
//! browser form or fetch can legitimately produce. The media-type
//! essence is compared after stripping parameters (`; charset=...`),
//! trimming, and lowercasing. A safe method without a Content-Type is
//! fine; a protected one is not.

use crate::{Policy, Verdict};
use common::{Reason, RequestMetadata};

/// Content types allowed by default.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: [&str; 3] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
];

/// Content-Type evaluator.
#[derive(Debug, Clone)]
pub struct ContentTypePolicy {
    allowed: Vec<String>,
    protected_methods: Vec<String>,
}

impl ContentTypePolicy {
    /// Evaluator over explicit allow and protected-method sets.
    #[must_use]
    pub fn new(allowed: &[String], protected_methods: &[String]) -> Self {
        Self {
            allowed: allowed
                .iter()
                .map(|essence| essence.trim().to_ascii_lowercase())
                .collect(),
            protected_methods: protected_methods
                .iter()
                .map(|method| method.to_uppercase())
                .collect(),
        }
    }

    /// Evaluator with the default allow-set.
    #[must_use]
    pub fn with_default_types(protected_methods: &[String]) -> Self {
        Self::new(
            &DEFAULT_ALLOWED_CONTENT_TYPES.map(ToString::to_string),
            protected_methods,
        )
    }

    /// Strip parameters, trim, and lowercase.
    fn essence(content_type: &str) -> String {
        content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }

    fn is_protected(&self, method: &str) -> bool {
        self.protected_methods
            .iter()
            .any(|protected| protected.eq_ignore_ascii_case(method))
    }
}

impl Policy for ContentTypePolicy {
    fn name(&self) -> &'static str {
        "content-type"
    }

    fn evaluate(&self, metadata: &RequestMetadata) -> Verdict {
        let essence = metadata
            .content_type
            .as_deref()
            .map(Self::essence)
            .filter(|essence| !essence.is_empty());

        match essence {
            Some(essence) => {
                if self.allowed.iter().any(|allowed| allowed == &essence) {
                    Verdict::Allow
                } else {
                    Verdict::Deny(Reason::ContentTypeDisallowed(essence))
                }
            }
            None => {
                if self.is_protected(&metadata.method) {
                    Verdict::Deny(Reason::ContentTypeMissingOnStateChange)
                } else {
                    Verdict::Allow
                }
            }
        }
    }
}
