//! Terminal deployment configuration.

use serde::{Deserialize, Serialize};

use crate::amount::Currency;

/// Environment variable holding the deployment location identifier.
pub const LOCATION_ID_ENV: &str = "PAYONPHONE_LOCATION_ID";
/// Environment variable holding the default charge currency.
pub const CURRENCY_ENV: &str = "PAYONPHONE_CURRENCY";

/// How readers are found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Scan for nearby Bluetooth readers.
    #[default]
    BluetoothScan,
    /// List readers registered to the account over the internet.
    Internet,
}

/// Parameters for a discovery scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfiguration {
    /// Scan method.
    #[serde(default)]
    pub method: DiscoveryMethod,
    /// Discover simulated readers instead of hardware.
    #[serde(default)]
    pub simulated: bool,
    /// Scan duration hint in seconds, passed through to the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Parameters for connecting to a reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfiguration {
    /// Deployment location the reader is registered to.
    pub location_id: String,
}

/// Deployment-time terminal settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Location every connection is scoped to. Never derived from the reader.
    pub location_id: String,
    /// Discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfiguration,
    /// Currency used when the caller does not pick one.
    #[serde(default)]
    pub default_currency: Currency,
}

impl TerminalConfig {
    /// Create a configuration for a location.
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            discovery: DiscoveryConfiguration::default(),
            default_currency: Currency::default(),
        }
    }

    /// Use simulated readers.
    pub fn simulated(mut self) -> Self {
        self.discovery.simulated = true;
        self
    }

    /// Set the default currency.
    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    /// Load from `PAYONPHONE_LOCATION_ID` and `PAYONPHONE_CURRENCY`.
    ///
    /// Returns `None` when no location is set.
    pub fn from_env() -> Option<Self> {
        let location_id = std::env::var(LOCATION_ID_ENV).ok()?;
        if location_id.trim().is_empty() {
            return None;
        }
        let config = Self::new(location_id);
        Some(match Self::currency_from_env() {
            Some(currency) => config.with_default_currency(currency),
            None => config,
        })
    }

    /// Read `PAYONPHONE_CURRENCY` on its own.
    ///
    /// An invalid code is ignored with a warning.
    pub fn currency_from_env() -> Option<Currency> {
        let code = std::env::var(CURRENCY_ENV).ok()?;
        parse_currency(&code)
    }

    /// Connection parameters scoped to the configured location.
    pub fn connection_configuration(&self) -> ConnectionConfiguration {
        ConnectionConfiguration {
            location_id: self.location_id.clone(),
        }
    }
}

fn parse_currency(code: &str) -> Option<Currency> {
    match Currency::new(code) {
        Ok(currency) => Some(currency),
        Err(e) => {
            tracing::warn!("ignoring {}: {}", CURRENCY_ENV, e);
            None
        }
    }
}
