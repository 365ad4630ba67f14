//! Configuration for the connection token backend.

use serde::{Deserialize, Serialize};

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_ENV: &str = "PAYONPHONE_BACKEND_URL";
/// Environment variable holding the request timeout in seconds.
pub const BACKEND_TIMEOUT_ENV: &str = "PAYONPHONE_BACKEND_TIMEOUT";

/// Where and how to reach the credential backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL (e.g., "https://payonphone-backend.onrender.com").
    pub base_url: String,

    /// Request timeout in seconds. Enforced by the HTTP client, not the session.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load from `PAYONPHONE_BACKEND_URL` and `PAYONPHONE_BACKEND_TIMEOUT`.
    ///
    /// Returns `None` when no URL is set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(BACKEND_URL_ENV).ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let mut config = Self::new(base_url);
        if let Some(secs) = std::env::var(BACKEND_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout_secs = secs;
        }
        Some(config)
    }

    /// Build the full URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
