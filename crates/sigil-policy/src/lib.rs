//! sigil policy evaluators.
//!
//! Provenance checks over normalized request metadata: Fetch-Metadata,
//! Origin/Referer, method classification, Content-Type, client-mode
//! detection, and the context-binding tier decision, composed through an
//! ordered, no-short-circuit chain.
//!
//! Every evaluator sees every request; the chain never stops at the
//! first failure, so the decision structure always reports the complete
//! set of failing layers while the reported reason is the first
//! failure's.

#![warn(clippy::pedantic)]

use common::{Reason, RequestMetadata};

pub mod chain;
pub mod client_mode;
pub mod content_type;
pub mod context_tier;
pub mod fetch_metadata;
pub mod method;
pub mod origin;

pub use chain::{evaluate_chain, ChainDecision};
pub use client_mode::{detect_client_mode, ClientMode};
pub use content_type::ContentTypePolicy;
pub use context_tier::{should_enforce_context, ContextTier};
pub use fetch_metadata::{FetchMetadataPolicy, LegacyBrowserMode};
pub use method::MethodPolicy;
pub use origin::OriginPolicy;

/// One evaluator's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The request passes this layer.
    Allow,
    /// The request fails this layer for the given internal reason.
    Deny(Reason),
}

impl Verdict {
    /// True when the verdict is [`Verdict::Allow`].
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// A single provenance check.
///
/// Evaluators are pure over the metadata: no I/O, no suspension, no
/// request mutation. `name` identifies the evaluator in the chain
/// decision's `evaluated` and `failures` lists.
pub trait Policy: Send + Sync {
    /// Stable evaluator name.
    fn name(&self) -> &'static str;

    /// Evaluate one request.
    fn evaluate(&self, metadata: &RequestMetadata) -> Verdict;
}
