//! HTTP method classification.
//!
//! Safe methods (GET, HEAD, OPTIONS, ...) are never CSRF targets; only
//! state-changing methods are gated. The classifier itself always
//! allows in-chain - it exists so the chain decision records that the
//! method layer ran - and the orchestrator consults
//! [`MethodPolicy::is_protected`] to decide whether to gate the request
//! at all.

use crate::{Policy, Verdict};
use common::RequestMetadata;

/// Methods gated by default.
pub const DEFAULT_PROTECTED_METHODS: [&str; 4] = ["POST", "PUT", "PATCH", "DELETE"];

/// Protected-method classifier.
#[derive(Debug, Clone)]
pub struct MethodPolicy {
    protected: Vec<String>,
}

impl MethodPolicy {
    /// Classifier over an explicit protected set.
    #[must_use]
    pub fn new(protected_methods: &[String]) -> Self {
        Self {
            protected: protected_methods
                .iter()
                .map(|method| method.to_uppercase())
                .collect(),
        }
    }

    /// True when `method` is in the protected set (case-insensitive).
    #[must_use]
    pub fn is_protected(&self, method: &str) -> bool {
        self.protected
            .iter()
            .any(|protected| protected.eq_ignore_ascii_case(method))
    }
}

impl Default for MethodPolicy {
    fn default() -> Self {
        Self::new(
            &DEFAULT_PROTECTED_METHODS
                .map(ToString::to_string),
        )
    }
}

impl Policy for MethodPolicy {
    fn name(&self) -> &'static str {
        "method"
    }

    fn evaluate(&self, _metadata: &RequestMetadata) -> Verdict {
        // Classification is a gate consulted by the orchestrator, not a
        // chain failure mode.
        Verdict::Allow
    }
}
