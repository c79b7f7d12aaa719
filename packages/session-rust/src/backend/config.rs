//! Configuration for the HTTP list backend.

use std::time::Duration;

/// Connection settings for [`HttpBackend`](super::HttpBackend).
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the list service API, without a trailing slash.
    pub base_url: String,
    /// Maximum time to wait for a single request.
    pub request_timeout: Duration,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    /// Items requested per page. The service caps this at 500.
    pub page_size: usize,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            request_timeout: Duration::from_secs(30),
            token: None,
            page_size: 500,
        }
    }
}

impl HttpBackendConfig {
    /// Config for `base_url` with the remaining fields defaulted.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
