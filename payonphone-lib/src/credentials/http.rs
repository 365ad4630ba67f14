//! HTTP client for the connection token backend.
//!
//! Talks to two endpoints:
//!
//! - `POST {base_url}/connection_token` with no body, answering
//!   `{"secret": "..."}`.
//! - `GET {base_url}/health`, answering `{"status": "OK", "timestamp": "..."}`.
//!
//! Without the `http-provider` feature every request returns
//! [`TerminalError::Unimplemented`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "http-provider")]
use std::time::Duration;

use super::config::BackendConfig;
use super::{ConnectionToken, ConnectionTokenProvider};
use crate::{Result, TerminalError};

/// Body of a successful `/connection_token` response.
#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "http-provider"), allow(dead_code))]
struct ConnectionTokenResponse {
    secret: String,
}

/// Body of the `/health` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// "OK" when the backend is serving.
    pub status: String,
    /// Server clock at the time of the check.
    pub timestamp: DateTime<Utc>,
}

impl BackendHealth {
    /// Check if the backend reported itself healthy.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Connection token provider backed by the PayOnPhone backend.
pub struct HttpTokenProvider {
    config: BackendConfig,
    #[cfg(feature = "http-provider")]
    client: reqwest::Client,
}

impl HttpTokenProvider {
    /// Create a new provider with the given configuration.
    #[cfg(feature = "http-provider")]
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TerminalError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a new provider with the given configuration (stub when feature disabled).
    #[cfg(not(feature = "http-provider"))]
    pub fn new(config: BackendConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Create a provider from `PAYONPHONE_BACKEND_URL`.
    pub fn from_env() -> Result<Self> {
        let config = BackendConfig::from_env().ok_or_else(|| {
            TerminalError::Configuration(format!(
                "{} is not set",
                super::config::BACKEND_URL_ENV
            ))
        })?;
        Self::new(config)
    }

    /// Get the configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Probe `GET /health`.
    #[cfg(feature = "http-provider")]
    #[tracing::instrument(skip(self), fields(base_url = %self.config.base_url))]
    pub async fn check_health(&self) -> Result<BackendHealth> {
        let response = self
            .client
            .get(self.config.url("health"))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TerminalError::credential(format!(
                "health check returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        response.json::<BackendHealth>().await.map_err(|e| {
            TerminalError::credential(format!("invalid health response: {}", e))
        })
    }

    /// Probe `GET /health` (stub when feature disabled).
    #[cfg(not(feature = "http-provider"))]
    pub async fn check_health(&self) -> Result<BackendHealth> {
        Err(TerminalError::Unimplemented(
            "HTTP credential provider not compiled - enable the 'http-provider' feature",
        ))
    }

    /// Map reqwest errors to a credential failure, keeping the cause.
    #[cfg(feature = "http-provider")]
    fn map_reqwest_error(&self, e: reqwest::Error) -> TerminalError {
        if e.is_timeout() {
            TerminalError::credential(format!(
                "request to {} timed out after {}s",
                self.config.base_url, self.config.timeout_secs
            ))
        } else if e.is_connect() {
            TerminalError::credential(format!(
                "could not connect to {}: {}",
                self.config.base_url, e
            ))
        } else {
            TerminalError::credential(e)
        }
    }
}

impl HttpTokenProvider {
    /// Mint a token with `POST /connection_token`.
    #[cfg(feature = "http-provider")]
    #[tracing::instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn request_token(&self) -> Result<ConnectionToken> {
        let response = self
            .client
            .post(self.config.url("connection_token"))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TerminalError::credential(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "connection token request rejected");
            return Err(TerminalError::credential(format!(
                "backend returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: ConnectionTokenResponse = serde_json::from_str(&body)?;
        tracing::debug!("connection token minted");
        ConnectionToken::new(parsed.secret)
    }

    #[cfg(not(feature = "http-provider"))]
    async fn request_token(&self) -> Result<ConnectionToken> {
        Err(TerminalError::Unimplemented(
            "HTTP credential provider not compiled - enable the 'http-provider' feature",
        ))
    }
}

#[async_trait]
impl ConnectionTokenProvider for HttpTokenProvider {
    async fn fetch_connection_token(&self) -> Result<ConnectionToken> {
        self.request_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_is_ok() {
        let health: BackendHealth = serde_json::from_str(
            r#"{"status": "OK", "timestamp": "2024-05-01T12:00:00.000Z"}"#,
        )
        .unwrap();
        assert!(health.is_ok());
        assert_eq!(health.timestamp.timestamp(), 1_714_564_800);
    }

    #[test]
    fn test_missing_secret_is_credential_error() {
        let parse_error =
            serde_json::from_str::<ConnectionTokenResponse>(r#"{"error": "boom"}"#).unwrap_err();
        let err: TerminalError = parse_error.into();
        assert!(matches!(err, TerminalError::CredentialFetch { .. }));
    }

    #[cfg(not(feature = "http-provider"))]
    #[tokio::test]
    async fn test_stub_without_feature() {
        let provider = HttpTokenProvider::new(BackendConfig::new("http://localhost:3000")).unwrap();
        let err = provider.fetch_connection_token().await.unwrap_err();
        assert!(matches!(err, TerminalError::Unimplemented(_)));
    }
}
