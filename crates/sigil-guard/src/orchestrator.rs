//! The orchestrator: keyrings, nonce cache, policy chains, and the
//! protect flow under one configuration.
//!
//! Keyrings are immutable values behind atomically-swapped pointers.
//! Validation loads a snapshot at its start and never observes a
//! rotation mid-flight; rotation derives successor rings and swaps the
//! pointers. The kid counter is a single instance-scoped 8-bit counter,
//! incremented only by [`SigilGuard::rotate_keys`].

use arc_swap::ArcSwap;
use common::secret::ExposeSecret;
use common::{Reason, RequestMetadata};
use sigil_policy::{
    detect_client_mode, evaluate_chain, should_enforce_context, ChainDecision, ClientMode,
    ContentTypePolicy, FetchMetadataPolicy, MethodPolicy, OriginPolicy, Policy,
};
use sigil_token::context::{compute_context, CONTEXT_LEN};
use sigil_token::crypto::CryptoError;
use sigil_token::{codec, validator};
use sigil_token::{CryptoProvider, KeyDomain, Keyring, NonceCache, RingProvider, Validation};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, SigilConfig};
use crate::response::IssuedToken;

/// Key id the instance starts from; rotation walks the counter upward
/// (wrapping at 255).
const INITIAL_KID: u8 = 1;

/// Errors surfaced at construction or rotation.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key derivation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors surfaced by token issuance.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The keyring holds no active signing key.
    #[error("No active signing key")]
    NoActiveKey,

    /// The one-shot subsystem is not enabled.
    #[error("One-shot tokens are not enabled")]
    OneShotNotEnabled,

    /// A crypto primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Outcome of gating one request.
#[derive(Debug, Clone)]
pub enum ProtectOutcome {
    /// The request may proceed. `policy` is the chain decision when a
    /// chain ran (unprotected methods skip it).
    Allowed {
        /// Chain decision, if a chain was evaluated.
        policy: Option<ChainDecision>,
    },

    /// The request must be rejected.
    Denied {
        /// Internal reason, for logs only.
        reason: Reason,
        /// True iff the failure was token expiry - the one condition
        /// the external surface may differentiate.
        expired: bool,
        /// Chain decision, if a chain was evaluated before the denial.
        policy: Option<ChainDecision>,
    },
}

impl ProtectOutcome {
    /// True when the request may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, ProtectOutcome::Allowed { .. })
    }

    /// The denial reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            ProtectOutcome::Allowed { .. } => None,
            ProtectOutcome::Denied { reason, .. } => Some(reason),
        }
    }
}

/// CSRF orchestrator.
///
/// Generic over the crypto provider; the default is the ring-backed
/// [`RingProvider`]. Shareable across threads: every mutable piece is
/// an atomic, an atomically-swapped pointer, or a mutex-backed cache.
pub struct SigilGuard<P: CryptoProvider = RingProvider> {
    provider: P,
    config: SigilConfig,
    csrf_ring: ArcSwap<Keyring>,
    one_shot_ring: Option<ArcSwap<Keyring>>,
    nonce_cache: Option<NonceCache>,
    kid_counter: AtomicU8,
    method_policy: MethodPolicy,
    browser_chain: Vec<Box<dyn Policy>>,
    api_chain: Vec<Box<dyn Policy>>,
}

impl SigilGuard<RingProvider> {
    /// Construct with the default ring-backed provider.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Config`] for an invalid configuration
    /// (master secret under 32 bytes) and [`GuardError::Crypto`] if
    /// initial key derivation fails.
    pub fn new(config: SigilConfig) -> Result<Self, GuardError> {
        Self::with_provider(RingProvider::new(), config)
    }
}

impl<P: CryptoProvider> SigilGuard<P> {
    /// Construct with an explicit crypto provider.
    ///
    /// # Errors
    ///
    /// Same as [`SigilGuard::new`].
    pub fn with_provider(provider: P, config: SigilConfig) -> Result<Self, GuardError> {
        config.validate()?;

        let master = config.master_secret.expose_secret();
        let csrf_ring = Keyring::create(&provider, master, INITIAL_KID, KeyDomain::Csrf)?;

        let (one_shot_ring, nonce_cache) = if config.one_shot_enabled {
            let ring = Keyring::create(&provider, master, INITIAL_KID, KeyDomain::OneShot)?;
            let cache = NonceCache::new(config.nonce_cache.clone());
            (Some(ArcSwap::from_pointee(ring)), Some(cache))
        } else {
            (None, None)
        };

        let method_policy = MethodPolicy::new(&config.protected_methods);
        let browser_chain: Vec<Box<dyn Policy>> = vec![
            Box::new(method_policy.clone()),
            Box::new(FetchMetadataPolicy::new(config.legacy_browser_mode)),
            Box::new(OriginPolicy::new(&config.allowed_origins)),
            Box::new(ContentTypePolicy::with_default_types(&config.protected_methods)),
        ];
        let api_chain: Vec<Box<dyn Policy>> = vec![
            Box::new(method_policy.clone()),
            Box::new(ContentTypePolicy::with_default_types(&config.protected_methods)),
        ];

        Ok(Self {
            provider,
            csrf_ring: ArcSwap::from_pointee(csrf_ring),
            one_shot_ring,
            nonce_cache,
            kid_counter: AtomicU8::new(INITIAL_KID),
            method_policy,
            browser_chain,
            api_chain,
            config,
        })
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Issue a regular token bound to `bindings`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NoActiveKey`] if the ring has no active
    /// key and [`TokenError::Crypto`] if the CSPRNG fails.
    pub fn issue_token(&self, bindings: &[&str]) -> Result<IssuedToken, TokenError> {
        self.issue_token_at(bindings, now_ms())
    }

    /// Deterministic [`SigilGuard::issue_token`] against an explicit
    /// clock.
    ///
    /// # Errors
    ///
    /// Same as [`SigilGuard::issue_token`].
    pub fn issue_token_at(
        &self,
        bindings: &[&str],
        now_ms: i64,
    ) -> Result<IssuedToken, TokenError> {
        let ring = self.csrf_ring.load();
        let key = ring.active().ok_or(TokenError::NoActiveKey)?;

        let context = compute_context(&self.provider, bindings);
        let token = codec::generate(&self.provider, key, Some(&context), as_wire_ts(now_ms))?;

        Ok(IssuedToken {
            token,
            expires_at: now_ms.saturating_add(duration_ms(self.config.token_ttl)),
            action: None,
        })
    }

    /// Issue a one-shot token bound to `action` and `bindings`. The
    /// fresh nonce is registered in the cache so the LRU+TTL bound
    /// covers outstanding tokens.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::OneShotNotEnabled`] when the subsystem is
    /// off, plus the [`SigilGuard::issue_token`] failure modes.
    pub fn issue_one_shot_token(
        &self,
        action: &str,
        bindings: &[&str],
    ) -> Result<IssuedToken, TokenError> {
        self.issue_one_shot_token_at(action, bindings, now_ms())
    }

    /// Deterministic [`SigilGuard::issue_one_shot_token`] against an
    /// explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`SigilGuard::issue_one_shot_token`].
    pub fn issue_one_shot_token_at(
        &self,
        action: &str,
        bindings: &[&str],
        now_ms: i64,
    ) -> Result<IssuedToken, TokenError> {
        let (ring, cache) = self.one_shot_parts()?;
        let ring = ring.load();
        let key = ring.active().ok_or(TokenError::NoActiveKey)?;

        let context = compute_context(&self.provider, bindings);
        let token = codec::generate_one_shot(
            &self.provider,
            key,
            action,
            Some(&context),
            as_wire_ts(now_ms),
        )?;

        let ttl_ms = duration_ms(self.config.one_shot_ttl);
        if let Some(parts) = codec::parse_one_shot(&token) {
            cache.add_at(&hex::encode(parts.nonce), ttl_ms, now_ms);
        }

        Ok(IssuedToken {
            token,
            expires_at: now_ms.saturating_add(ttl_ms),
            action: Some(action.to_string()),
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate a regular token against the current keyring snapshot.
    #[must_use]
    pub fn validate_token(&self, token: &str, bindings: &[&str]) -> Validation {
        self.validate_token_at(token, bindings, now_ms())
    }

    /// Deterministic [`SigilGuard::validate_token`] against an explicit
    /// clock.
    #[must_use]
    pub fn validate_token_at(&self, token: &str, bindings: &[&str], now_ms: i64) -> Validation {
        let expected = self.expected_context(bindings);
        let ring = self.csrf_ring.load();
        validator::validate_at(
            &self.provider,
            &ring,
            token,
            expected.as_ref(),
            duration_ms(self.config.token_ttl),
            duration_ms(self.config.grace_window),
            now_ms,
        )
    }

    /// Validate a one-shot token, consuming its nonce on success. All
    /// keys in the oneshot ring are tried.
    #[must_use]
    pub fn validate_one_shot_token(
        &self,
        token: &str,
        action: &str,
        bindings: &[&str],
    ) -> Validation {
        self.validate_one_shot_token_at(token, action, bindings, now_ms())
    }

    /// Deterministic [`SigilGuard::validate_one_shot_token`] against an
    /// explicit clock.
    #[must_use]
    pub fn validate_one_shot_token_at(
        &self,
        token: &str,
        action: &str,
        bindings: &[&str],
        now_ms: i64,
    ) -> Validation {
        let Ok((ring, cache)) = self.one_shot_parts() else {
            return Validation::Invalid {
                reason: Reason::OneShotNotEnabled,
            };
        };

        let expected = self.expected_context(bindings);
        let ring = ring.load();
        validator::validate_one_shot_at(
            &self.provider,
            &ring,
            token,
            action,
            expected.as_ref(),
            duration_ms(self.config.one_shot_ttl),
            now_ms,
            cache,
        )
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    /// Rotate both keyrings to the next kid from the instance counter.
    /// Returns the new kid.
    ///
    /// In-flight validations keep the snapshot they loaded; the swap
    /// becomes visible to subsequent loads.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Crypto`] if derivation fails; neither ring
    /// is swapped in that case.
    pub fn rotate_keys(&self) -> Result<u8, GuardError> {
        let new_kid = self.kid_counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let master = self.config.master_secret.expose_secret();

        let next_csrf = self.csrf_ring.load().rotate(&self.provider, master, new_kid)?;
        let next_one_shot = match &self.one_shot_ring {
            Some(ring) => Some(ring.load().rotate(&self.provider, master, new_kid)?),
            None => None,
        };

        self.csrf_ring.store(Arc::new(next_csrf));
        if let (Some(slot), Some(next)) = (&self.one_shot_ring, next_one_shot) {
            slot.store(Arc::new(next));
        }

        Ok(new_kid)
    }

    /// The kid currently active for issuance.
    #[must_use]
    pub fn active_kid(&self) -> u8 {
        self.csrf_ring.load().active_kid()
    }

    // =========================================================================
    // Protect
    // =========================================================================

    /// Gate one request: method classification, client-mode detection,
    /// the mode-appropriate policy chain, token presence, and token
    /// validation.
    #[must_use]
    pub fn protect(&self, metadata: &RequestMetadata, bindings: &[&str]) -> ProtectOutcome {
        self.protect_at(metadata, bindings, now_ms())
    }

    /// Deterministic [`SigilGuard::protect`] against an explicit clock.
    #[must_use]
    pub fn protect_at(
        &self,
        metadata: &RequestMetadata,
        bindings: &[&str],
        now_ms: i64,
    ) -> ProtectOutcome {
        // 1. Unprotected methods pass without a chain.
        if !self.method_policy.is_protected(&metadata.method) {
            return ProtectOutcome::Allowed { policy: None };
        }

        // 2-3. Client mode, and whether API clients are allowed at all.
        let mode = detect_client_mode(metadata, self.config.disable_client_mode_override);
        if mode == ClientMode::Api && !self.config.allow_api_mode {
            self.log_denial(&Reason::ApiModeNotAllowed, metadata);
            return ProtectOutcome::Denied {
                reason: Reason::ApiModeNotAllowed,
                expired: false,
                policy: None,
            };
        }

        // 4-5. The mode-appropriate chain.
        let chain = match mode {
            ClientMode::Browser => &self.browser_chain,
            ClientMode::Api => &self.api_chain,
        };
        let decision = evaluate_chain(chain, metadata);
        if !decision.allowed {
            let reason = decision
                .reason
                .clone()
                .unwrap_or(Reason::EmptyPolicyChain);
            self.log_denial(&reason, metadata);
            return ProtectOutcome::Denied {
                reason,
                expired: false,
                policy: Some(decision),
            };
        }

        // 6. A protected request must carry a token.
        let Some(token) = metadata.token_source.token() else {
            self.log_denial(&Reason::NoTokenPresent, metadata);
            return ProtectOutcome::Denied {
                reason: Reason::NoTokenPresent,
                expired: false,
                policy: Some(decision),
            };
        };

        // 7. Validate against the context computed from the bindings.
        match self.validate_token_at(token, bindings, now_ms) {
            Validation::Valid => ProtectOutcome::Allowed {
                policy: Some(decision),
            },
            Validation::Invalid {
                reason: Reason::ContextMismatch,
            } if !self.enforce_context_mismatch(metadata) => {
                tracing::warn!(
                    target: "sigil.guard",
                    method = %metadata.method,
                    "Context mismatch tolerated by binding tier"
                );
                ProtectOutcome::Allowed {
                    policy: Some(decision),
                }
            }
            Validation::Invalid { reason } => {
                self.log_denial(&reason, metadata);
                ProtectOutcome::Denied {
                    expired: reason.is_expired(),
                    reason,
                    policy: Some(decision),
                }
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn one_shot_parts(&self) -> Result<(&ArcSwap<Keyring>, &NonceCache), TokenError> {
        match (&self.one_shot_ring, &self.nonce_cache) {
            (Some(ring), Some(cache)) => Ok((ring, cache)),
            _ => Err(TokenError::OneShotNotEnabled),
        }
    }

    /// Expected context for validation: only supplied when the caller
    /// actually binds the request to something.
    fn expected_context(&self, bindings: &[&str]) -> Option<[u8; CONTEXT_LEN]> {
        if bindings.is_empty() {
            None
        } else {
            Some(compute_context(&self.provider, bindings))
        }
    }

    /// Whether a context mismatch denies under the configured tier.
    /// Without a tier configuration every mismatch denies.
    fn enforce_context_mismatch(&self, metadata: &RequestMetadata) -> bool {
        match &self.config.context_binding {
            Some(binding) => should_enforce_context(
                binding.tier,
                metadata.session_age_ms,
                duration_ms(binding.grace_period),
            ),
            None => true,
        }
    }

    fn log_denial(&self, reason: &Reason, metadata: &RequestMetadata) {
        tracing::debug!(
            target: "sigil.guard",
            reason = %reason,
            method = %metadata.method,
            "Request denied"
        );
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Millisecond timestamps cross the wire as u64; a pre-epoch clock
/// degrades to zero rather than wrapping.
fn as_wire_ts(now_ms: i64) -> u64 {
    u64::try_from(now_ms).unwrap_or_default()
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
