//! HTTP basic authentication

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lrsync_core::AuthorizationProvider;
use lrsync_domain::constants::HEADER_AUTHORIZATION;
use lrsync_domain::RequestHeaders;

/// Adds `Authorization: Basic base64(username:password)` to every request.
#[derive(Clone)]
pub struct BasicHttpAuthentication {
    header_value: String,
}

impl BasicHttpAuthentication {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Self { header_value: format!("Basic {encoded}") }
    }

    /// Use a precomputed header value verbatim, e.g. a key issued by the
    /// store operator.
    pub fn with_header_value(header_value: impl Into<String>) -> Self {
        Self { header_value: header_value.into() }
    }

    pub fn header_value(&self) -> &str {
        &self.header_value
    }
}

impl AuthorizationProvider for BasicHttpAuthentication {
    fn decorate(&self, headers: &mut RequestHeaders) {
        headers.set(HEADER_AUTHORIZATION, self.header_value.as_str());
    }
}

impl std::fmt::Debug for BasicHttpAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicHttpAuthentication").field("header_value", &"<redacted>").finish()
    }
}
