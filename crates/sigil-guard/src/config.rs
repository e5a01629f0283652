//! Orchestrator configuration.
//!
//! Built with `new` plus `with_*` setters; every option has the
//! documented default except the master secret, which the caller must
//! provide and which must be at least 32 bytes. The secret is wrapped
//! in a `SecretBox`: redacted in Debug output, zeroized on drop, and
//! only reachable through an explicit `expose_secret()`.

use common::secret::{ExposeSecret, SecretBox};
use sigil_policy::context_tier::DEFAULT_CONTEXT_GRACE_MS;
use sigil_policy::method::DEFAULT_PROTECTED_METHODS;
use sigil_policy::{ContextTier, LegacyBrowserMode};
use sigil_token::nonce_cache::NonceCacheConfig;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Minimum master secret length in bytes.
///
/// HKDF-SHA256 never benefits from more than the hash's security level,
/// but it cannot rescue a short input; 32 bytes keeps the input keyed
/// at the full 256-bit level.
pub const MIN_MASTER_SECRET_BYTES: usize = 32;

/// Default regular-token validity (20 minutes).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(20 * 60);

/// Default post-TTL grace window (60 seconds), covering requests in
/// flight across the TTL boundary.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(60);

/// Default one-shot token validity (5 minutes).
pub const DEFAULT_ONE_SHOT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default token transport header.
pub const DEFAULT_HEADER_NAME: &str = "x-csrf-token";

/// Default one-shot token transport header. Reserved: accepted by the
/// configuration surface, consumed by nothing in the core yet.
pub const DEFAULT_ONE_SHOT_HEADER_NAME: &str = "x-csrf-one-shot-token";

/// Configuration errors surfaced at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The master secret was shorter than [`MIN_MASTER_SECRET_BYTES`].
    #[error("Master secret must be at least {MIN_MASTER_SECRET_BYTES} bytes, got {0}")]
    MasterSecretTooShort(usize),
}

/// Context-binding enforcement configuration.
#[derive(Debug, Clone)]
pub struct ContextBindingConfig {
    /// Risk tier deciding which mismatches are enforced.
    pub tier: ContextTier,

    /// Session-age grace period for the medium tier.
    pub grace_period: Duration,
}

impl ContextBindingConfig {
    /// Tier with the default 5-minute grace period.
    #[must_use]
    pub fn new(tier: ContextTier) -> Self {
        #[allow(clippy::cast_sign_loss)]
        let grace_period = Duration::from_millis(DEFAULT_CONTEXT_GRACE_MS as u64);
        Self { tier, grace_period }
    }

    /// Override the grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Orchestrator configuration with secure handling of the master
/// secret.
pub struct SigilConfig {
    /// HKDF input keying material. At least 32 bytes.
    pub master_secret: SecretBox<Vec<u8>>,

    /// Regular-token validity window.
    pub token_ttl: Duration,

    /// Post-TTL tolerance for regular tokens.
    pub grace_window: Duration,

    /// Origins accepted by the Origin/Referer evaluator.
    pub allowed_origins: Vec<String>,

    /// Handling of requests without Fetch-Metadata headers.
    pub legacy_browser_mode: LegacyBrowserMode,

    /// Permit non-browser clients at all.
    pub allow_api_mode: bool,

    /// Methods gated by the core.
    pub protected_methods: Vec<String>,

    /// Context-binding enforcement; unset means mismatches always deny.
    pub context_binding: Option<ContextBindingConfig>,

    /// Enable the one-shot subsystem (oneshot keyring + nonce cache).
    pub one_shot_enabled: bool,

    /// One-shot token validity window. No grace.
    pub one_shot_ttl: Duration,

    /// Token transport header name.
    pub header_name: String,

    /// Reserved one-shot transport header name.
    pub one_shot_header_name: String,

    /// Ignore `X-Client-Type` when detecting the client mode.
    pub disable_client_mode_override: bool,

    /// Nonce cache bounds for the one-shot subsystem.
    pub nonce_cache: NonceCacheConfig,
}

impl SigilConfig {
    /// Configuration with defaults around the given master secret.
    #[must_use]
    pub fn new(master_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            master_secret: SecretBox::new(Box::new(master_secret.into())),
            token_ttl: DEFAULT_TOKEN_TTL,
            grace_window: DEFAULT_GRACE_WINDOW,
            allowed_origins: Vec::new(),
            legacy_browser_mode: LegacyBrowserMode::default(),
            allow_api_mode: true,
            protected_methods: DEFAULT_PROTECTED_METHODS.map(ToString::to_string).to_vec(),
            context_binding: None,
            one_shot_enabled: false,
            one_shot_ttl: DEFAULT_ONE_SHOT_TTL,
            header_name: DEFAULT_HEADER_NAME.to_string(),
            one_shot_header_name: DEFAULT_ONE_SHOT_HEADER_NAME.to_string(),
            disable_client_mode_override: false,
            nonce_cache: NonceCacheConfig::default(),
        }
    }

    /// Set the regular-token TTL.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the post-TTL grace window.
    #[must_use]
    pub fn with_grace_window(mut self, grace: Duration) -> Self {
        self.grace_window = grace;
        self
    }

    /// Set the allowed origins.
    #[must_use]
    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the legacy-browser handling mode.
    #[must_use]
    pub fn with_legacy_browser_mode(mut self, mode: LegacyBrowserMode) -> Self {
        self.legacy_browser_mode = mode;
        self
    }

    /// Allow or forbid non-browser clients.
    #[must_use]
    pub fn with_allow_api_mode(mut self, allow: bool) -> Self {
        self.allow_api_mode = allow;
        self
    }

    /// Set the protected method set.
    #[must_use]
    pub fn with_protected_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Configure context-binding enforcement.
    #[must_use]
    pub fn with_context_binding(mut self, binding: ContextBindingConfig) -> Self {
        self.context_binding = Some(binding);
        self
    }

    /// Enable the one-shot subsystem.
    #[must_use]
    pub fn with_one_shot_enabled(mut self, enabled: bool) -> Self {
        self.one_shot_enabled = enabled;
        self
    }

    /// Set the one-shot token TTL.
    #[must_use]
    pub fn with_one_shot_ttl(mut self, ttl: Duration) -> Self {
        self.one_shot_ttl = ttl;
        self
    }

    /// Set the token transport header name.
    #[must_use]
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Ignore the `X-Client-Type` override.
    #[must_use]
    pub fn with_disable_client_mode_override(mut self, disable: bool) -> Self {
        self.disable_client_mode_override = disable;
        self
    }

    /// Set the nonce cache bounds.
    #[must_use]
    pub fn with_nonce_cache(mut self, nonce_cache: NonceCacheConfig) -> Self {
        self.nonce_cache = nonce_cache;
        self
    }

    /// Check construction-time invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MasterSecretTooShort`] when the master
    /// secret is under 32 bytes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret_len = self.master_secret.expose_secret().len();
        if secret_len < MIN_MASTER_SECRET_BYTES {
            return Err(ConfigError::MasterSecretTooShort(secret_len));
        }
        Ok(())
    }
}

/// Clone implementation that explicitly clones the boxed secret.
impl Clone for SigilConfig {
    fn clone(&self) -> Self {
        Self {
            master_secret: SecretBox::new(Box::new(self.master_secret.expose_secret().clone())),
            token_ttl: self.token_ttl,
            grace_window: self.grace_window,
            allowed_origins: self.allowed_origins.clone(),
            legacy_browser_mode: self.legacy_browser_mode,
            allow_api_mode: self.allow_api_mode,
            protected_methods: self.protected_methods.clone(),
            context_binding: self.context_binding.clone(),
            one_shot_enabled: self.one_shot_enabled,
            one_shot_ttl: self.one_shot_ttl,
            header_name: self.header_name.clone(),
            one_shot_header_name: self.one_shot_header_name.clone(),
            disable_client_mode_override: self.disable_client_mode_override,
            nonce_cache: self.nonce_cache.clone(),
        }
    }
}

/// Custom Debug implementation that redacts the master secret.
impl fmt::Debug for SigilConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigilConfig")
            .field("master_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("grace_window", &self.grace_window)
            .field("allowed_origins", &self.allowed_origins)
            .field("legacy_browser_mode", &self.legacy_browser_mode)
            .field("allow_api_mode", &self.allow_api_mode)
            .field("protected_methods", &self.protected_methods)
            .field("context_binding", &self.context_binding)
            .field("one_shot_enabled", &self.one_shot_enabled)
            .field("one_shot_ttl", &self.one_shot_ttl)
            .field("header_name", &self.header_name)
            .field("one_shot_header_name", &self.one_shot_header_name)
            .field(
                "disable_client_mode_override",
                &self.disable_client_mode_override,
            )
            .field("nonce_cache", &self.nonce_cache)
            .finish()
    }
}
