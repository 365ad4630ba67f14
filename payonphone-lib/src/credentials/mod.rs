//! Connection credentials for the terminal runtime.
//!
//! The runtime asks a [`ConnectionTokenProvider`] for a fresh, short-lived
//! secret whenever it needs to authorize a session. Providers perform one
//! round trip per call and never retry; retry policy belongs to the caller.
//!
//! ## Feature Flags
//!
//! The `http-provider` feature flag must be enabled for real HTTP requests:
//!
//! ```toml
//! [dependencies]
//! payonphone-lib = { version = "0.1", features = ["http-provider"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payonphone_lib::credentials::{BackendConfig, ConnectionTokenProvider, HttpTokenProvider};
//!
//! let provider = HttpTokenProvider::new(BackendConfig::new("https://pos.example.com"))?;
//! let token = provider.fetch_connection_token().await?;
//! ```

mod config;
mod http;

pub use config::BackendConfig;
pub use http::{BackendHealth, HttpTokenProvider};

use async_trait::async_trait;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Result, TerminalError};

/// A one-time secret authorizing a terminal runtime session.
///
/// The secret is wiped from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConnectionToken {
    secret: String,
}

impl ConnectionToken {
    /// Wrap a secret. Empty secrets are rejected.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(TerminalError::credential("empty secret"));
        }
        Ok(Self { secret })
    }

    /// Expose the secret to the runtime.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    /// Always false; empty secrets cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionToken")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Source of connection credentials.
#[async_trait]
pub trait ConnectionTokenProvider: Send + Sync {
    /// Mint one connection credential.
    ///
    /// All failures surface as [`TerminalError::CredentialFetch`].
    async fn fetch_connection_token(&self) -> Result<ConnectionToken>;
}

/// Provider that hands out a fixed secret. For offline demos and tests.
#[derive(Clone)]
pub struct StaticTokenProvider {
    secret: String,
}

impl StaticTokenProvider {
    /// Create a provider returning `secret` on every call.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionTokenProvider for StaticTokenProvider {
    async fn fetch_connection_token(&self) -> Result<ConnectionToken> {
        ConnectionToken::new(self.secret.clone())
    }
}
