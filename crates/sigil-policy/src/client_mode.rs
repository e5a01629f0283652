//! Browser/API client-mode detection.
//!
//! Browser chains check provenance headers a browser always sends; a
//! non-browser client (mobile app, service) sends none of them and gets
//! the thinner API chain instead. A client may declare itself with
//! `X-Client-Type: api`; deployments that cannot trust that header
//! disable the override and fall back to `Sec-Fetch-Site` presence as
//! the browser signal.

use common::RequestMetadata;

/// Detected client mode for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// A browser: full provenance chain applies.
    Browser,
    /// A non-browser client: token and content-type checks only.
    Api,
}

/// Detect the client mode for one request.
///
/// With the override enabled (the default), `X-Client-Type: api` wins.
/// Otherwise a present `Sec-Fetch-Site` marks a browser and anything
/// else is treated as API.
#[must_use]
pub fn detect_client_mode(metadata: &RequestMetadata, disable_override: bool) -> ClientMode {
    let declared_api = metadata
        .client_type
        .as_deref()
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("api"));

    if !disable_override && declared_api {
        return ClientMode::Api;
    }

    let has_fetch_metadata = metadata
        .sec_fetch_site
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());

    if has_fetch_metadata {
        ClientMode::Browser
    } else {
        ClientMode::Api
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_type: Option<&str>, sec_fetch_site: Option<&str>) -> RequestMetadata {
        RequestMetadata {
            client_type: client_type.map(ToString::to_string),
            sec_fetch_site: sec_fetch_site.map(ToString::to_string),
            ..RequestMetadata::for_method("POST")
        }
    }

    #[test]
    fn test_declared_api_client_wins_when_override_enabled() {
        let metadata = request(Some("api"), Some("same-origin"));
        assert_eq!(detect_client_mode(&metadata, false), ClientMode::Api);
    }

    #[test]
    fn test_disabled_override_ignores_declaration() {
        let metadata = request(Some("api"), Some("same-origin"));
        assert_eq!(detect_client_mode(&metadata, true), ClientMode::Browser);
    }

    #[test]
    fn test_fetch_metadata_presence_marks_browser() {
        let metadata = request(None, Some("cross-site"));
        assert_eq!(detect_client_mode(&metadata, false), ClientMode::Browser);
    }

    #[test]
    fn test_no_signals_means_api() {
        let metadata = request(None, None);
        assert_eq!(detect_client_mode(&metadata, false), ClientMode::Api);

        let metadata = request(Some("browser"), None);
        assert_eq!(detect_client_mode(&metadata, false), ClientMode::Api);

        let metadata = request(None, Some("  "));
        assert_eq!(detect_client_mode(&metadata, false), ClientMode::Api);
    }
}
