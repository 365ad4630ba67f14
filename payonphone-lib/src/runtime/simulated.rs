//! Software reader runtime for development and tests.
//!
//! Behaves like a Bluetooth reader fleet: scans report readers one at a
//! time, connects may install a firmware update first, collection prompts
//! the cardholder, and amounts ending in the configured cents decline.
//! Every operation can be scripted to fail, and the reader can be dropped
//! at any point, including halfway through a connect.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{
    DiscoveryCancel, ReaderError, ReaderEventCallback, ReaderListCallback, RuntimeResult,
    TerminalRuntime, UnexpectedDisconnectCallback,
};
use crate::config::{ConnectionConfiguration, DiscoveryConfiguration};
use crate::credentials::ConnectionTokenProvider;
use crate::intent::{
    CardPresentDetails, PaymentIntent, PaymentIntentParameters, PaymentIntentStatus,
};
use crate::reader::{
    DeviceType, Reader, ReaderDisplayMessage, ReaderEvent, ReaderInputOption, ReaderSoftwareUpdate,
};

/// Operations that can be scripted to fail or counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimulatedOperation {
    /// Reader discovery.
    Discover,
    /// Reader connection.
    Connect,
    /// Payment intent creation.
    CreateIntent,
    /// Payment method collection.
    Collect,
    /// Payment processing and capture.
    Capture,
    /// Reader disconnection.
    Disconnect,
}

/// Behavior of the simulated reader fleet.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Readers reported by discovery, in order.
    pub readers: Vec<Reader>,
    /// Delay between discovery updates.
    pub update_interval: Duration,
    /// Time the scan keeps running after the last update.
    pub scan_duration: Duration,
    /// Keep scanning until canceled.
    pub hold_open: bool,
    /// Firmware update installed on first connect, if any.
    pub pending_update: Option<ReaderSoftwareUpdate>,
    /// Time the cardholder takes to present a card.
    pub collect_delay: Duration,
    /// Amounts whose cents equal this value are declined.
    pub decline_cents: Option<u64>,
    /// Card reported for collected payments.
    pub card: CardPresentDetails,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            readers: vec![
                Reader::new("tmr_sim_m2", "STRM26138003393", DeviceType::StripeM2)
                    .with_label("Simulated M2")
                    .with_software_version("2.01.00.17"),
                Reader::new("tmr_sim_wp3", "WPC323011001234", DeviceType::WisePad3)
                    .with_label("Simulated WisePad 3")
                    .with_software_version("1.00.03.34"),
            ],
            update_interval: Duration::from_millis(50),
            scan_duration: Duration::from_millis(200),
            hold_open: false,
            pending_update: None,
            collect_delay: Duration::from_millis(10),
            decline_cents: Some(1),
            card: CardPresentDetails {
                brand: "visa".to_string(),
                last4: "4242".to_string(),
            },
        }
    }
}

impl SimulatorConfig {
    /// Replace the discoverable readers.
    pub fn with_readers(mut self, readers: Vec<Reader>) -> Self {
        self.readers = readers;
        self
    }

    /// Keep scans open until canceled.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Install a firmware update on the next connect.
    pub fn with_pending_update(mut self, update: ReaderSoftwareUpdate) -> Self {
        self.pending_update = Some(update);
        self
    }

    /// Set how long card collection takes.
    pub fn with_collect_delay(mut self, delay: Duration) -> Self {
        self.collect_delay = delay;
        self
    }

    /// Set (or disable) the decline rule.
    pub fn with_decline_cents(mut self, cents: Option<u64>) -> Self {
        self.decline_cents = cents;
        self
    }
}

/// A [`TerminalRuntime`] backed by simulated readers.
pub struct SimulatedTerminal {
    config: SimulatorConfig,
    token_provider: RwLock<Option<Arc<dyn ConnectionTokenProvider>>>,
    disconnect_handler: RwLock<Option<UnexpectedDisconnectCallback>>,
    connected: RwLock<Option<Reader>>,
    connecting: RwLock<Option<(u64, Reader)>>,
    connect_attempts: AtomicU64,
    update_installed: RwLock<bool>,
    failures: RwLock<HashMap<SimulatedOperation, ReaderError>>,
    calls: RwLock<HashMap<SimulatedOperation, usize>>,
    token_fetches: AtomicUsize,
}

impl SimulatedTerminal {
    /// Create a simulator with default readers.
    pub fn new() -> Arc<Self> {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a simulator with custom behavior.
    pub fn with_config(config: SimulatorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            token_provider: RwLock::new(None),
            disconnect_handler: RwLock::new(None),
            connected: RwLock::new(None),
            connecting: RwLock::new(None),
            connect_attempts: AtomicU64::new(0),
            update_installed: RwLock::new(false),
            failures: RwLock::new(HashMap::new()),
            calls: RwLock::new(HashMap::new()),
            token_fetches: AtomicUsize::new(0),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Make every subsequent call to `operation` fail with `error`.
    pub fn fail(&self, operation: SimulatedOperation, error: ReaderError) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation, error);
    }

    /// Stop failing `operation`.
    pub fn clear_failure(&self, operation: SimulatedOperation) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&operation);
    }

    /// Number of times `operation` was invoked.
    pub fn calls(&self, operation: SimulatedOperation) -> usize {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of connection tokens fetched from the provider.
    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }

    /// Reader the simulator considers connected.
    pub fn connected_reader(&self) -> Option<Reader> {
        self.connected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drop the connected reader as if it lost power.
    ///
    /// With no reader connected, drops the reader being connected instead;
    /// that connect then fails. Returns false when neither exists.
    pub fn trigger_unexpected_disconnect(&self) -> bool {
        let connected = self
            .connected
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let reader = connected.or_else(|| {
            self.connecting
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .take()
                .map(|(_, reader)| reader)
        });
        let Some(reader) = reader else {
            return false;
        };

        let handler = self
            .disconnect_handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(reader);
        }
        true
    }

    /// Count the call and return the scripted failure, if any.
    fn enter(&self, operation: SimulatedOperation) -> RuntimeResult<()> {
        *self
            .calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(operation)
            .or_insert(0) += 1;

        match self
            .failures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&operation)
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Fetch and consume one connection token.
    async fn authorize(&self) -> RuntimeResult<()> {
        let provider = self
            .token_provider
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| ReaderError::Token("no connection token provider registered".into()))?;

        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        let token = provider
            .fetch_connection_token()
            .await
            .map_err(|e| ReaderError::Token(e.to_string()))?;
        tracing::debug!(secret_len = token.len(), "simulated session authorized");
        Ok(())
    }

    fn require_connected(&self) -> RuntimeResult<Reader> {
        self.connected_reader().ok_or(ReaderError::NotConnected)
    }

    /// Finish connect `attempt`, unless its reader was dropped meanwhile.
    fn complete_connect(&self, attempt: u64, reader: &Reader) -> RuntimeResult<()> {
        let mut connecting = self.connecting.write().unwrap_or_else(|e| e.into_inner());
        match connecting.take() {
            Some((id, _)) if id == attempt => {
                *self.connected.write().unwrap_or_else(|e| e.into_inner()) = Some(reader.clone());
                Ok(())
            }
            other => {
                *connecting = other;
                Err(ReaderError::Bluetooth(format!(
                    "reader {} dropped during connect",
                    reader.serial_number
                )))
            }
        }
    }

    async fn install_update(
        &self,
        update: &ReaderSoftwareUpdate,
        on_event: &ReaderEventCallback,
    ) {
        on_event(ReaderEvent::SoftwareUpdateStarted(update.clone()));
        for step in 1..=4u8 {
            tokio::time::sleep(self.config.update_interval).await;
            on_event(ReaderEvent::SoftwareUpdateProgress(f32::from(step) / 4.0));
        }
        on_event(ReaderEvent::SoftwareUpdateFinished { error: None });
        *self
            .update_installed
            .write()
            .unwrap_or_else(|e| e.into_inner()) = true;
    }
}

#[async_trait]
impl TerminalRuntime for SimulatedTerminal {
    fn set_token_provider(&self, provider: Arc<dyn ConnectionTokenProvider>) {
        *self
            .token_provider
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(provider);
    }

    fn set_unexpected_disconnect_handler(&self, handler: UnexpectedDisconnectCallback) {
        *self
            .disconnect_handler
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    async fn discover_readers(
        &self,
        config: &DiscoveryConfiguration,
        on_update: ReaderListCallback,
        mut cancel: DiscoveryCancel,
    ) -> RuntimeResult<()> {
        self.enter(SimulatedOperation::Discover)?;
        self.authorize().await?;
        tracing::debug!(method = ?config.method, "simulated scan started");

        let scan = async {
            for found in 1..=self.config.readers.len() {
                tokio::time::sleep(self.config.update_interval).await;
                on_update(self.config.readers[..found].to_vec());
            }
            if self.config.hold_open {
                std::future::pending::<()>().await;
            }
            let duration = config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(self.config.scan_duration);
            tokio::time::sleep(duration).await;
        };

        tokio::select! {
            _ = scan => Ok(()),
            _ = &mut cancel => Err(ReaderError::Canceled),
        }
    }

    async fn connect_reader(
        &self,
        reader: &Reader,
        config: &ConnectionConfiguration,
        on_event: ReaderEventCallback,
    ) -> RuntimeResult<Reader> {
        self.enter(SimulatedOperation::Connect)?;
        if let Some(current) = self.connected_reader() {
            return Err(ReaderError::Busy(format!(
                "already connected to {}",
                current.serial_number
            )));
        }
        if !self
            .config
            .readers
            .iter()
            .any(|r| r.serial_number == reader.serial_number)
        {
            return Err(ReaderError::Bluetooth(format!(
                "reader {} is out of range",
                reader.serial_number
            )));
        }
        self.authorize().await?;

        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.connecting.write().unwrap_or_else(|e| e.into_inner()) =
            Some((attempt, reader.clone()));

        let already_updated = *self
            .update_installed
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let (Some(update), false) = (&self.config.pending_update, already_updated) {
            self.install_update(update, &on_event).await;
        }

        self.complete_connect(attempt, reader)?;
        tracing::debug!(
            location_id = %config.location_id,
            serial = %reader.serial_number,
            "simulated reader connected"
        );
        Ok(reader.clone())
    }

    async fn create_payment_intent(
        &self,
        params: &PaymentIntentParameters,
    ) -> RuntimeResult<PaymentIntent> {
        self.enter(SimulatedOperation::CreateIntent)?;
        let id = format!("pi_sim_{}", uuid::Uuid::new_v4().simple());
        Ok(PaymentIntent::new(id, params))
    }

    async fn collect_payment_method(
        &self,
        mut intent: PaymentIntent,
        on_event: ReaderEventCallback,
    ) -> RuntimeResult<PaymentIntent> {
        self.enter(SimulatedOperation::Collect)?;
        self.require_connected()?;
        if intent.status != PaymentIntentStatus::RequiresPaymentMethod {
            return Err(ReaderError::Other(format!(
                "intent {} does not need a payment method",
                intent.id
            )));
        }

        on_event(ReaderEvent::InputRequested(vec![
            ReaderInputOption::Insert,
            ReaderInputOption::Tap,
            ReaderInputOption::Swipe,
        ]));
        tokio::time::sleep(self.config.collect_delay).await;
        self.require_connected()?;
        on_event(ReaderEvent::DisplayMessage(ReaderDisplayMessage::RemoveCard));

        intent.card = Some(self.config.card.clone());
        intent.status = PaymentIntentStatus::RequiresConfirmation;
        Ok(intent)
    }

    async fn process_payment(&self, mut intent: PaymentIntent) -> RuntimeResult<PaymentIntent> {
        self.enter(SimulatedOperation::Capture)?;
        self.require_connected()?;
        if intent.status != PaymentIntentStatus::RequiresConfirmation {
            return Err(ReaderError::Other(format!(
                "intent {} has no collected payment method",
                intent.id
            )));
        }
        if let Some(cents) = self.config.decline_cents {
            if intent.amount.minor_units() % 100 == cents {
                return Err(ReaderError::Declined("generic_decline".into()));
            }
        }

        intent.status = PaymentIntentStatus::Succeeded;
        Ok(intent)
    }

    async fn disconnect_reader(&self) -> RuntimeResult<()> {
        self.enter(SimulatedOperation::Disconnect)?;
        self.connected
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .map(|_| ())
            .ok_or(ReaderError::NotConnected)
    }
}
