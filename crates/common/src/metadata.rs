//! Normalized request metadata consumed by the policy evaluators and the
//! orchestrator.
//!
//! Adapters own the translation from raw framework requests into this
//! shape: header names case-folded, method uppercased, Content-Type
//! parameters left intact (the evaluator strips them), and the token
//! extracted with strict transport precedence. The core never touches a
//! raw request.

/// Where the token transport value was found, in strict precedence order:
/// custom header, then JSON body field, then form body field.
///
/// Query-string transport is forbidden - tokens in URLs leak through
/// logs, referrers, and browser history - so no variant exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenSource {
    /// Token taken from the configured header (default `x-csrf-token`).
    Header(String),

    /// Token taken from the JSON body field `csrf_token`.
    JsonBody(String),

    /// Token taken from the form body field `csrf_token`.
    FormBody(String),

    /// No token present in any accepted transport.
    #[default]
    None,
}

impl TokenSource {
    /// The transported token value, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            TokenSource::Header(t) | TokenSource::JsonBody(t) | TokenSource::FormBody(t) => {
                Some(t)
            }
            TokenSource::None => None,
        }
    }

    /// True when no transport carried a token.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, TokenSource::None)
    }
}

/// Normalized metadata for a single request.
///
/// All header-derived fields are `None` when the header was absent.
/// `method` is expected uppercased by the adapter; evaluators still
/// fold case on the attacker-controlled signals.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// HTTP method, uppercase (`GET`, `POST`, ...).
    pub method: String,

    /// `Origin` header value.
    pub origin: Option<String>,

    /// `Referer` header value.
    pub referer: Option<String>,

    /// `Sec-Fetch-Site` header value.
    pub sec_fetch_site: Option<String>,

    /// `Sec-Fetch-Mode` header value.
    pub sec_fetch_mode: Option<String>,

    /// `Sec-Fetch-Dest` header value.
    pub sec_fetch_dest: Option<String>,

    /// `Content-Type` header value, parameters intact.
    pub content_type: Option<String>,

    /// Token transport and value.
    pub token_source: TokenSource,

    /// `X-Client-Type` header value (`"api"` opts out of browser checks
    /// unless the override is disabled by configuration).
    pub client_type: Option<String>,

    /// Age of the authenticated session in milliseconds, when the
    /// adapter's session layer knows it. Consulted by the medium
    /// context-binding tier; `None` enforces.
    pub session_age_ms: Option<i64>,
}

impl RequestMetadata {
    /// Metadata for a bare request with the given method and no headers.
    #[must_use]
    pub fn for_method(method: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            ..Self::default()
        }
    }
}
