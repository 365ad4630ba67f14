//! Device session: reader lifecycle and payment collection.
//!
//! A [`DeviceSession`] is built once at startup and handed by reference (it
//! is cheap to clone) to whatever drives it. It owns the lifecycle
//!
//! ```text
//! NotConnected --connect--> Connecting --ok--> Connected --disconnect--> NotConnected
//!                               |                  |
//!                               +--error-----------+--unexpected drop--> NotConnected
//! ```
//!
//! plus two orthogonal flags: `is_discovering` and `payment_in_progress`.
//! A connect whose future is dropped before it resolves goes back to
//! `NotConnected`, as does one whose reader drops while connecting.
//!
//! # Publishing
//!
//! Observers read state through [`DeviceSession::subscribe`] (a `watch`
//! channel of [`SessionSnapshot`]) and receive typed [`SessionEvent`]s via
//! [`DeviceSession::on_event`]. Every mutation goes through the single
//! `watch` sender, so each published snapshot is a complete transition.
//!
//! # Concurrency
//!
//! Operations are async and may be driven from any task. Stages of a charge
//! are strictly sequential and only one charge runs at a time. Nothing
//! serializes a disconnect against a running charge: if a disconnect lands
//! mid-charge, the pipeline's remaining stages fail at the runtime, and a
//! capture that completes anyway is still recorded as the last payment.

mod events;
mod pipeline;
mod state;

pub use events::{DiscoveryOutcome, SessionEvent, SessionEventCallback};
pub use pipeline::{PaymentPipeline, PipelineStage, StageCallback};
pub use state::{ConnectionStatus, SessionSnapshot};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::amount::{Amount, Currency};
use crate::config::TerminalConfig;
use crate::credentials::ConnectionTokenProvider;
use crate::intent::{PaymentIntent, PaymentIntentParameters};
use crate::reader::{dedup_by_serial, Reader, ReaderEvent};
use crate::runtime::{ReaderError, ReaderEventCallback, TerminalRuntime};
use crate::{Result, TerminalError};

/// Handle to a running discovery scan.
///
/// Dropping the handle does not stop the scan.
pub struct DiscoveryHandle {
    inner: Arc<SessionInner>,
    task: JoinHandle<DiscoveryOutcome>,
}

impl DiscoveryHandle {
    /// Cancel the scan. Returns false if it already finished.
    pub fn cancel(&self) -> bool {
        self.inner.cancel_discovery()
    }

    /// Wait for the scan to end.
    pub async fn wait(self) -> DiscoveryOutcome {
        self.task.await.unwrap_or_else(|e| {
            DiscoveryOutcome::Failed(TerminalError::Internal(format!(
                "discovery task failed: {}",
                e
            )))
        })
    }
}

impl std::fmt::Debug for DiscoveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// The reader/payment session.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    runtime: Arc<dyn TerminalRuntime>,
    config: TerminalConfig,
    state: watch::Sender<SessionSnapshot>,
    discovery_cancel: Mutex<Option<oneshot::Sender<()>>>,
    listeners: RwLock<Vec<SessionEventCallback>>,
    connect_attempt: AtomicU64,
}

impl DeviceSession {
    /// Create a session and register the credential provider and the
    /// unexpected-disconnect handler with the runtime.
    pub fn new(
        runtime: Arc<dyn TerminalRuntime>,
        token_provider: Arc<dyn ConnectionTokenProvider>,
        config: TerminalConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let inner = Arc::new(SessionInner {
            runtime,
            config,
            state,
            discovery_cancel: Mutex::new(None),
            listeners: RwLock::new(Vec::new()),
            connect_attempt: AtomicU64::new(0),
        });

        inner.runtime.set_token_provider(token_provider);
        let weak = Arc::downgrade(&inner);
        inner
            .runtime
            .set_unexpected_disconnect_handler(Arc::new(move |reader: Reader| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_unexpected_disconnect(reader);
                }
            }));

        Self { inner }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TerminalConfig {
        &self.inner.config
    }

    /// Current published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Register a callback for session events.
    pub fn on_event(&self, callback: SessionEventCallback) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
    }

    /// Start a discovery scan in the background.
    ///
    /// Returns `None` without touching state when a scan is already running.
    /// Otherwise clears the reader list, sets `is_discovering`, and returns
    /// a handle to the scan. Must be called within a Tokio runtime.
    #[tracing::instrument(skip(self))]
    pub fn discover_readers(&self) -> Option<DiscoveryHandle> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut slot = self
                .inner
                .discovery_cancel
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let started = self.inner.state.send_if_modified(|s| {
                if s.is_discovering {
                    return false;
                }
                s.is_discovering = true;
                s.discovered_readers.clear();
                true
            });
            if !started {
                tracing::debug!("discovery already running");
                return None;
            }
            *slot = Some(cancel_tx);
        }

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_discovery(cancel_rx).await });
        Some(DiscoveryHandle {
            inner: self.inner.clone(),
            task,
        })
    }

    /// Cancel the running discovery scan. Returns false if none is running.
    pub fn cancel_discovery(&self) -> bool {
        self.inner.cancel_discovery()
    }

    /// Connect to a discovered reader.
    ///
    /// Status becomes `Connecting` during this call, before the returned
    /// future is first polled. On success the reader is recorded and status
    /// becomes `Connected`; on failure status returns to `NotConnected`.
    /// Fails without touching state if a reader is connected or a connect is
    /// already outstanding.
    ///
    /// Dropping the future before it completes (including through a timeout)
    /// puts status back to `NotConnected`. An unexpected disconnect while
    /// connecting wins over a late success, which is then reported as a
    /// connection failure.
    pub fn connect_to_reader(
        &self,
        reader: Reader,
    ) -> impl Future<Output = Result<Reader>> + Send + 'static {
        let claimed = self.inner.begin_connect(&reader);
        async move {
            let guard = claimed?;
            let inner = guard.inner.clone();
            let result = inner.finish_connect(reader, guard.attempt).await;
            drop(guard);
            result
        }
    }

    /// Charge `amount` on the connected reader.
    ///
    /// Fails with [`TerminalError::NoReaderConnected`] before any runtime
    /// call when no reader is connected, and with
    /// [`TerminalError::PaymentInProgress`] when another charge is running.
    /// Uses the configured default currency when `currency` is `None`.
    #[tracing::instrument(skip(self, amount), fields(amount = amount.minor_units()))]
    pub async fn process_payment(
        &self,
        amount: Amount,
        currency: Option<Currency>,
    ) -> Result<PaymentIntent> {
        let _guard = self.inner.claim_payment()?;
        let currency =
            currency.unwrap_or_else(|| self.inner.config.default_currency.clone());
        let params = PaymentIntentParameters::new(amount, currency);

        let weak = Arc::downgrade(&self.inner);
        let pipeline =
            PaymentPipeline::new(self.inner.runtime.clone(), self.inner.reader_events())
                    .with_stage_callback(Arc::new(move |stage: PipelineStage| {
                    if let Some(inner) = weak.upgrade() {
                        inner.emit(&SessionEvent::PaymentStage(stage));
                    }
                }));

        match pipeline.run(params).await {
            Ok(intent) => {
                tracing::info!(
                    intent_id = %intent.id,
                    amount = %intent.display_amount(),
                    "payment successful"
                );
                self.inner.state.send_modify(|s| {
                    s.last_payment_intent = Some(intent.clone());
                });
                self.inner.emit(&SessionEvent::PaymentSucceeded(intent.clone()));
                Ok(intent)
            }
            Err(error) => {
                tracing::warn!("{}", error);
                let stage = PipelineStage::of(&error).unwrap_or(PipelineStage::CreateIntent);
                self.inner.emit(&SessionEvent::PaymentFailed {
                    stage,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Disconnect the connected reader.
    ///
    /// On failure the published status is left unchanged, so observers may
    /// still show the reader as connected.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        match self.inner.runtime.disconnect_reader().await {
            Ok(()) => {
                self.inner.state.send_modify(|s| {
                    s.connected_reader = None;
                    s.connection_status = ConnectionStatus::NotConnected;
                });
                tracing::info!("reader disconnected");
                self.inner.emit(&SessionEvent::Disconnected);
                Ok(())
            }
            Err(e) => {
                let error = TerminalError::Disconnect(e.to_string());
                tracing::warn!("{}", error);
                self.inner.emit(&SessionEvent::DisconnectFailed(error.clone()));
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Clears `payment_in_progress` when a charge ends, however it ends.
struct PaymentGuard {
    inner: Arc<SessionInner>,
}

impl Drop for PaymentGuard {
    fn drop(&mut self) {
        self.inner.state.send_modify(|s| s.payment_in_progress = false);
    }
}

/// Puts a claimed connect back to `NotConnected` if it never finished.
struct ConnectGuard {
    inner: Arc<SessionInner>,
    attempt: u64,
}

impl Drop for ConnectGuard {
    fn drop(&mut self) {
        let inner = &self.inner;
        let attempt = self.attempt;
        let abandoned = inner.state.send_if_modified(|s| {
            if s.connection_status != ConnectionStatus::Connecting
                || !inner.is_current_attempt(attempt)
            {
                return false;
            }
            s.connection_status = ConnectionStatus::NotConnected;
            s.connected_reader = None;
            true
        });
        if abandoned {
            tracing::debug!(attempt, "connect abandoned before completion");
        }
    }
}

impl SessionInner {
    fn emit(&self, event: &SessionEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener(event);
        }
    }

    /// Callback forwarding reader events to observers.
    fn reader_events(self: &Arc<Self>) -> ReaderEventCallback {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event: ReaderEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.forward_reader_event(event);
            }
        })
    }

    fn forward_reader_event(&self, event: ReaderEvent) {
        match &event {
            ReaderEvent::SoftwareUpdateStarted(update) => {
                tracing::info!(version = %update.version, "installing reader update");
            }
            ReaderEvent::SoftwareUpdateProgress(progress) => {
                tracing::debug!(progress = *progress, "reader update progress");
            }
            ReaderEvent::SoftwareUpdateFinished { error: Some(error) } => {
                tracing::warn!("reader update failed: {}", error);
            }
            ReaderEvent::SoftwareUpdateFinished { error: None } => {
                tracing::info!("reader update completed");
            }
            ReaderEvent::InputRequested(options) => {
                tracing::info!(?options, "reader requesting input");
            }
            ReaderEvent::DisplayMessage(message) => {
                tracing::info!(%message, "reader display");
            }
        }
        self.emit(&SessionEvent::Reader(event));
    }

    async fn run_discovery(self: Arc<Self>, cancel: oneshot::Receiver<()>) -> DiscoveryOutcome {
        let weak = Arc::downgrade(&self);
        let on_update = Arc::new(move |readers: Vec<Reader>| {
            if let Some(inner) = weak.upgrade() {
                let readers = dedup_by_serial(readers);
                inner.state.send_if_modified(|s| {
                    if !s.is_discovering {
                        return false;
                    }
                    s.discovered_readers = readers;
                    true
                });
            }
        });

        let result = self
            .runtime
            .discover_readers(&self.config.discovery, on_update, cancel)
            .await;

        let outcome = match result {
            Ok(()) => {
                tracing::info!("discovery completed");
                DiscoveryOutcome::Completed
            }
            Err(ReaderError::Canceled) => {
                tracing::debug!("discovery canceled");
                DiscoveryOutcome::Canceled
            }
            Err(e) => {
                let error = match e {
                    ReaderError::Token(reason) => TerminalError::CredentialFetch { reason },
                    other => TerminalError::Discovery(other.to_string()),
                };
                tracing::warn!("Discovery failed: {}", error);
                DiscoveryOutcome::Failed(error)
            }
        };

        {
            let mut slot = self
                .discovery_cancel
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            slot.take();
            self.state.send_modify(|s| s.is_discovering = false);
        }
        self.emit(&SessionEvent::DiscoveryFinished(outcome.clone()));
        outcome
    }

    fn cancel_discovery(&self) -> bool {
        let sender = self
            .discovery_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    fn is_current_attempt(&self, attempt: u64) -> bool {
        self.connect_attempt.load(Ordering::SeqCst) == attempt
    }

    fn begin_connect(self: &Arc<Self>, reader: &Reader) -> Result<ConnectGuard> {
        let mut refusal = None;
        let mut attempt = 0;
        self.state.send_if_modified(|s| {
            if s.connection_status != ConnectionStatus::NotConnected {
                refusal = Some(match &s.connected_reader {
                    Some(current) => format!("already connected to {}", current.serial_number),
                    None => "a connection is already in progress".to_string(),
                });
                return false;
            }
            attempt = self.connect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
            s.connection_status = ConnectionStatus::Connecting;
            true
        });

        match refusal {
            Some(reason) => Err(TerminalError::Connection {
                serial_number: reader.serial_number.clone(),
                reason,
            }),
            None => {
                tracing::debug!(serial = %reader.serial_number, attempt, "connecting");
                Ok(ConnectGuard {
                    inner: self.clone(),
                    attempt,
                })
            }
        }
    }

    async fn finish_connect(self: Arc<Self>, reader: Reader, attempt: u64) -> Result<Reader> {
        let connection = self.config.connection_configuration();
        let result = self
            .runtime
            .connect_reader(&reader, &connection, self.reader_events())
            .await;

        let error = match result {
            Ok(connected) => {
                let applied = self.state.send_if_modified(|s| {
                    if s.connection_status != ConnectionStatus::Connecting
                        || !self.is_current_attempt(attempt)
                    {
                        return false;
                    }
                    s.connected_reader = Some(connected.clone());
                    s.connection_status = ConnectionStatus::Connected;
                    true
                });
                if applied {
                    tracing::info!("Connected to reader: {}", connected.display_label());
                    self.emit(&SessionEvent::Connected(connected.clone()));
                    return Ok(connected);
                }
                TerminalError::Connection {
                    serial_number: reader.serial_number.clone(),
                    reason: "reader disconnected while connecting".to_string(),
                }
            }
            Err(ReaderError::Token(reason)) => TerminalError::CredentialFetch { reason },
            Err(other) => TerminalError::Connection {
                serial_number: reader.serial_number.clone(),
                reason: other.to_string(),
            },
        };

        self.state.send_if_modified(|s| {
            if s.connection_status != ConnectionStatus::Connecting
                || !self.is_current_attempt(attempt)
            {
                return false;
            }
            s.connected_reader = None;
            s.connection_status = ConnectionStatus::NotConnected;
            true
        });
        tracing::warn!("{}", error);
        self.emit(&SessionEvent::ConnectionFailed(error.clone()));
        Err(error)
    }

    fn claim_payment(self: &Arc<Self>) -> Result<PaymentGuard> {
        let mut refusal = None;
        self.state.send_if_modified(|s| {
            if s.connected_reader.is_none() {
                refusal = Some(TerminalError::NoReaderConnected);
                return false;
            }
            if s.payment_in_progress {
                refusal = Some(TerminalError::PaymentInProgress);
                return false;
            }
            s.payment_in_progress = true;
            true
        });

        match refusal {
            Some(error) => {
                tracing::warn!("{}", error);
                Err(error)
            }
            None => Ok(PaymentGuard {
                inner: self.clone(),
            }),
        }
    }

    fn handle_unexpected_disconnect(&self, reader: Reader) {
        tracing::warn!(serial = %reader.serial_number, "reader disconnected unexpectedly");
        self.state.send_modify(|s| {
            s.connected_reader = None;
            s.connection_status = ConnectionStatus::NotConnected;
        });
        self.emit(&SessionEvent::UnexpectedDisconnect(reader));
    }
}
