//! Typed notifications emitted by a session.

use std::sync::Arc;

use super::pipeline::PipelineStage;
use crate::intent::PaymentIntent;
use crate::reader::{Reader, ReaderEvent};
use crate::TerminalError;

/// How a discovery scan ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DiscoveryOutcome {
    /// The scan ran to completion.
    Completed,
    /// The scan was canceled through its handle.
    Canceled,
    /// The scan failed. Reported, never fatal.
    Failed(TerminalError),
}

/// Notification delivered to registered observers.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A discovery scan ended.
    DiscoveryFinished(DiscoveryOutcome),
    /// A reader connected.
    Connected(Reader),
    /// A connect attempt failed and status went back to not connected.
    ConnectionFailed(TerminalError),
    /// The payment pipeline entered a stage.
    PaymentStage(PipelineStage),
    /// A payment was captured.
    PaymentSucceeded(PaymentIntent),
    /// The payment pipeline aborted.
    PaymentFailed {
        /// Stage that failed.
        stage: PipelineStage,
        /// Failure reported to the caller.
        error: TerminalError,
    },
    /// The reader was disconnected on request.
    Disconnected,
    /// A disconnect request failed; status was left unchanged.
    DisconnectFailed(TerminalError),
    /// The reader dropped without a disconnect request.
    UnexpectedDisconnect(Reader),
    /// Forwarded reader notification.
    Reader(ReaderEvent),
}

/// Callback for session events.
pub type SessionEventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;
