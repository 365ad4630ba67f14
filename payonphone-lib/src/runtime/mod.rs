//! Boundary to the terminal runtime that drives reader hardware.
//!
//! The session never talks to readers directly. Every hardware or network
//! step goes through a [`TerminalRuntime`], which reports progress through
//! small callbacks handed over per operation:
//!
//! - [`ReaderListCallback`] receives discovery snapshots,
//! - [`ReaderEventCallback`] receives update progress and cardholder prompts,
//! - [`UnexpectedDisconnectCallback`] is registered once and fires when a
//!   connected reader drops without being asked to.
//!
//! The runtime owns credential handling: it calls the registered
//! [`ConnectionTokenProvider`] whenever it needs to authorize a session.
//! No timeout is enforced here; that is the transport's business.

mod simulated;

pub use simulated::{SimulatedOperation, SimulatedTerminal, SimulatorConfig};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::config::{ConnectionConfiguration, DiscoveryConfiguration};
use crate::credentials::ConnectionTokenProvider;
use crate::intent::{PaymentIntent, PaymentIntentParameters};
use crate::reader::{Reader, ReaderEvent};

/// Error reported by the runtime or the reader itself.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    /// The card issuer declined the payment.
    #[error("card declined: {0}")]
    Declined(String),
    /// The operation was canceled before it completed.
    #[error("operation canceled")]
    Canceled,
    /// The reader is busy with another operation or connection.
    #[error("reader busy: {0}")]
    Busy(String),
    /// Bluetooth link failure.
    #[error("bluetooth error: {0}")]
    Bluetooth(String),
    /// The runtime could not obtain a connection token.
    #[error("connection token unavailable: {0}")]
    Token(String),
    /// The operation needs a connected reader.
    #[error("not connected to a reader")]
    NotConnected,
    /// Any other runtime failure.
    #[error("{0}")]
    Other(String),
}

/// Result alias for runtime calls.
pub type RuntimeResult<T> = std::result::Result<T, ReaderError>;

/// Receives the full list of readers found so far. Each call replaces the last.
pub type ReaderListCallback = Arc<dyn Fn(Vec<Reader>) + Send + Sync>;

/// Receives fire-and-forget reader events.
pub type ReaderEventCallback = Arc<dyn Fn(ReaderEvent) + Send + Sync>;

/// Receives the reader that dropped unexpectedly.
pub type UnexpectedDisconnectCallback = Arc<dyn Fn(Reader) + Send + Sync>;

/// Resolves when the caller cancels a discovery scan.
///
/// A dropped sender counts as a cancel.
pub type DiscoveryCancel = oneshot::Receiver<()>;

/// Hardware and network operations the session depends on.
///
/// Each method completes once, with either a value or an error. Calls on one
/// runtime may overlap; sequencing is the session's job.
#[async_trait]
pub trait TerminalRuntime: Send + Sync {
    /// Register the credential source used to authorize sessions.
    fn set_token_provider(&self, provider: Arc<dyn ConnectionTokenProvider>);

    /// Register the handler for readers that drop without a disconnect call.
    fn set_unexpected_disconnect_handler(&self, handler: UnexpectedDisconnectCallback);

    /// Scan for readers until the scan finishes or `cancel` fires.
    ///
    /// Returns [`ReaderError::Canceled`] when canceled. No list updates are
    /// delivered after cancellation.
    async fn discover_readers(
        &self,
        config: &DiscoveryConfiguration,
        on_update: ReaderListCallback,
        cancel: DiscoveryCancel,
    ) -> RuntimeResult<()>;

    /// Connect to a discovered reader.
    async fn connect_reader(
        &self,
        reader: &Reader,
        config: &ConnectionConfiguration,
        on_event: ReaderEventCallback,
    ) -> RuntimeResult<Reader>;

    /// Create a payment intent.
    async fn create_payment_intent(
        &self,
        params: &PaymentIntentParameters,
    ) -> RuntimeResult<PaymentIntent>;

    /// Present an intent to the reader and wait for a card.
    async fn collect_payment_method(
        &self,
        intent: PaymentIntent,
        on_event: ReaderEventCallback,
    ) -> RuntimeResult<PaymentIntent>;

    /// Process (and, with automatic capture, capture) a collected intent.
    async fn process_payment(&self, intent: PaymentIntent) -> RuntimeResult<PaymentIntent>;

    /// Disconnect from the connected reader.
    async fn disconnect_reader(&self) -> RuntimeResult<()>;
}
