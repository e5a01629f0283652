//! sigil orchestrator.
//!
//! [`SigilGuard`] combines the token engine and the policy evaluators
//! under one configuration and exposes the three operations adapters
//! call: issue, validate, and protect. Framework adapters translate raw
//! requests into [`common::RequestMetadata`] and translate
//! [`ProtectOutcome`] into their response type using the shapes in
//! [`response`].

#![warn(clippy::pedantic)]

/// Module for the resolved configuration surface
pub mod config;

/// Module for the orchestrator itself
pub mod orchestrator;

/// Module for the external response shapes adapters serialize
pub mod response;

pub use config::{ConfigError, ContextBindingConfig, SigilConfig};
pub use orchestrator::{GuardError, ProtectOutcome, SigilGuard, TokenError};
pub use response::{denial_surface, Denial, DenialBody, IssuedToken};

pub use common::{Reason, RequestMetadata, TokenSource};
pub use sigil_policy::{ClientMode, ContextTier, LegacyBrowserMode};
pub use sigil_token::{CryptoProvider, RingProvider, Validation};
