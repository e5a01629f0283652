//! Context-binding enforcement tiers.
//!
//! A context mismatch can mean an attack or an ordinary session
//! handoff (a session renewed mid-flight, a login that re-keyed the
//! binding). The tier decides which mismatches are enforced; it is a
//! decision function consulted by the orchestrator, not a chain gate.

/// Risk tier for context-binding enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTier {
    /// Never enforce; mismatches are logged only.
    Low,
    /// Tolerate mismatches while the session is younger than the grace
    /// period; enforce otherwise. An unknown or negative session age
    /// enforces.
    Medium,
    /// Always enforce.
    High,
}

/// Default grace period for the medium tier (5 minutes).
pub const DEFAULT_CONTEXT_GRACE_MS: i64 = 5 * 60 * 1000;

/// Whether a context mismatch should deny the request.
#[must_use]
pub fn should_enforce_context(
    tier: ContextTier,
    session_age_ms: Option<i64>,
    grace_period_ms: i64,
) -> bool {
    match tier {
        ContextTier::Low => false,
        ContextTier::Medium => match session_age_ms {
            Some(age) if (0..grace_period_ms).contains(&age) => false,
            // Unknown or negative age: enforce
            _ => true,
        },
        ContextTier::High => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_never_enforces() {
        assert!(!should_enforce_context(ContextTier::Low, None, 1_000));
        assert!(!should_enforce_context(ContextTier::Low, Some(0), 1_000));
        assert!(!should_enforce_context(
            ContextTier::Low,
            Some(i64::MAX),
            1_000
        ));
    }

    #[test]
    fn test_high_always_enforces() {
        assert!(should_enforce_context(ContextTier::High, None, 1_000));
        assert!(should_enforce_context(ContextTier::High, Some(10), 1_000));
    }

    #[test]
    fn test_medium_tolerates_within_grace() {
        assert!(!should_enforce_context(ContextTier::Medium, Some(0), 1_000));
        assert!(!should_enforce_context(
            ContextTier::Medium,
            Some(999),
            1_000
        ));
    }

    #[test]
    fn test_medium_enforces_at_and_past_grace() {
        assert!(should_enforce_context(
            ContextTier::Medium,
            Some(1_000),
            1_000
        ));
        assert!(should_enforce_context(
            ContextTier::Medium,
            Some(86_400_000),
            1_000
        ));
    }

    #[test]
    fn test_medium_enforces_on_unknown_or_negative_age() {
        assert!(should_enforce_context(ContextTier::Medium, None, 1_000));
        assert!(should_enforce_context(ContextTier::Medium, Some(-1), 1_000));
    }
}
