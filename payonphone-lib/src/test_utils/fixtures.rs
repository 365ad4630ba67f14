//! Fixtures for session tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::TerminalConfig;
use crate::credentials::{ConnectionToken, ConnectionTokenProvider, StaticTokenProvider};
use crate::reader::{DeviceType, Reader};
use crate::runtime::{SimulatedTerminal, SimulatorConfig};
use crate::session::DeviceSession;
use crate::{Result, TerminalError};

const TEST_LOCATION_ID: &str = "tml_test_location";
const TEST_TOKEN_SECRET: &str = "pst_test_secret";

/// A reader with the given serial and label.
pub fn fixture_reader(serial: &str, label: &str) -> Reader {
    Reader::new(format!("tmr_{}", serial.to_lowercase()), serial, DeviceType::StripeM2)
        .with_label(label)
}

/// A session over a fresh simulator, not connected.
pub fn simulated_session(config: SimulatorConfig) -> (DeviceSession, Arc<SimulatedTerminal>) {
    let sim = SimulatedTerminal::with_config(config);
    let session = DeviceSession::new(
        sim.clone(),
        Arc::new(StaticTokenProvider::new(TEST_TOKEN_SECRET)),
        TerminalConfig::new(TEST_LOCATION_ID).simulated(),
    );
    (session, sim)
}

/// A session connected to reader `R100` ("Reader A").
///
/// `config` keeps its behavior but its reader list is replaced.
///
/// # Panics
/// Panics if the simulator refuses the connection.
pub async fn connected_session(
    config: SimulatorConfig,
) -> (DeviceSession, Arc<SimulatedTerminal>) {
    let reader = fixture_reader("R100", "Reader A");
    let (session, sim) = simulated_session(config.with_readers(vec![reader.clone()]));
    if let Err(e) = session.connect_to_reader(reader).await {
        panic!("fixture reader failed to connect: {}", e);
    }
    (session, sim)
}

/// Provider that always fails.
#[derive(Clone, Debug)]
pub struct FailingTokenProvider {
    reason: String,
}

impl FailingTokenProvider {
    /// Create a provider failing with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ConnectionTokenProvider for FailingTokenProvider {
    async fn fetch_connection_token(&self) -> Result<ConnectionToken> {
        Err(TerminalError::CredentialFetch {
            reason: self.reason.clone(),
        })
    }
}

/// Provider that counts fetches and returns a fresh secret each time.
#[derive(Debug, Default)]
pub struct CountingTokenProvider {
    fetches: AtomicUsize,
}

impl CountingTokenProvider {
    /// Create a provider with no fetches recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionTokenProvider for CountingTokenProvider {
    async fn fetch_connection_token(&self) -> Result<ConnectionToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionToken::new(format!("{}_{}", TEST_TOKEN_SECRET, n))
    }
}
