//! Ordered, no-short-circuit policy composition.

use crate::{Policy, Verdict};
use common::{Reason, RequestMetadata};
use serde::Serialize;

/// Aggregate decision for one request across a policy chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainDecision {
    /// True iff every policy allowed the request.
    pub allowed: bool,

    /// The first failing policy's reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,

    /// Names of every policy that ran, in order.
    pub evaluated: Vec<&'static str>,

    /// Names of every policy that denied, in order.
    pub failures: Vec<&'static str>,
}

/// Evaluate every policy in order and aggregate the outcome.
///
/// No short-circuiting: a failure does not stop later evaluators, so
/// `evaluated` always lists the whole chain and `failures` lists every
/// layer that would have denied. The reported reason is the FIRST
/// failure's, which is what the caller acts on.
///
/// An empty chain fails closed with `empty_policy_chain`: a
/// misconfigured gate must deny, not wave requests through.
#[must_use]
pub fn evaluate_chain(policies: &[Box<dyn Policy>], metadata: &RequestMetadata) -> ChainDecision {
    if policies.is_empty() {
        tracing::warn!(
            target: "sigil.policy",
            "Empty policy chain evaluated; denying fail-closed"
        );
        return ChainDecision {
            allowed: false,
            reason: Some(Reason::EmptyPolicyChain),
            evaluated: Vec::new(),
            failures: Vec::new(),
        };
    }

    let mut evaluated = Vec::with_capacity(policies.len());
    let mut failures = Vec::new();
    let mut first_reason = None;

    for policy in policies {
        let verdict = policy.evaluate(metadata);
        evaluated.push(policy.name());

        if let Verdict::Deny(reason) = verdict {
            failures.push(policy.name());
            if first_reason.is_none() {
                first_reason = Some(reason);
            }
        }
    }

    ChainDecision {
        allowed: first_reason.is_none(),
        reason: first_reason,
        evaluated,
        failures,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct FixedPolicy {
        name: &'static str,
        verdict: Verdict,
    }

    impl Policy for FixedPolicy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn evaluate(&self, _metadata: &RequestMetadata) -> Verdict {
            self.verdict.clone()
        }
    }

    fn allow(name: &'static str) -> Box<dyn Policy> {
        Box::new(FixedPolicy {
            name,
            verdict: Verdict::Allow,
        })
    }

    fn deny(name: &'static str, reason: Reason) -> Box<dyn Policy> {
        Box::new(FixedPolicy {
            name,
            verdict: Verdict::Deny(reason),
        })
    }

    #[test]
    fn test_empty_chain_fails_closed() {
        let decision = evaluate_chain(&[], &RequestMetadata::for_method("POST"));

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(Reason::EmptyPolicyChain));
        assert!(decision.evaluated.is_empty());
        assert!(decision.failures.is_empty());
    }

    #[test]
    fn test_all_allow_is_allowed() {
        let chain = vec![allow("one"), allow("two"), allow("three")];
        let decision = evaluate_chain(&chain, &RequestMetadata::for_method("POST"));

        assert!(decision.allowed);
        assert_eq!(decision.reason, None);
        assert_eq!(decision.evaluated, vec!["one", "two", "three"]);
        assert!(decision.failures.is_empty());
    }

    /// Later policies still run after a failure, and the first failure
    /// supplies the reason.
    #[test]
    fn test_no_short_circuit_and_first_failure_reason() {
        let chain = vec![
            allow("one"),
            deny("two", Reason::FetchMetadataCrossSite),
            deny("three", Reason::OriginMissing),
            allow("four"),
        ];
        let decision = evaluate_chain(&chain, &RequestMetadata::for_method("POST"));

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(Reason::FetchMetadataCrossSite));
        assert_eq!(decision.evaluated, vec!["one", "two", "three", "four"]);
        assert_eq!(decision.failures, vec!["two", "three"]);
    }

    #[test]
    fn test_decision_serializes_with_reason_code() {
        let chain = vec![deny("gate", Reason::OriginMissing)];
        let decision = evaluate_chain(&chain, &RequestMetadata::for_method("POST"));

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"], "origin_missing");
        assert_eq!(json["failures"][0], "gate");
    }
}
