//! Pay-on-phone terminal library.
//!
//! Drives a card reader from a point-of-sale app: fetch connection tokens
//! from the merchant backend, discover and connect readers, and take
//! card-present payments through a three-stage pipeline.
//!
//! # Features
//!
//! - **Device Session**: one long-lived [`DeviceSession`] owning reader
//!   connection state, observable through a `watch` channel and typed events
//! - **Payment Pipeline**: create intent, collect card, capture
//! - **Credential Provider**: pluggable [`ConnectionTokenProvider`], with an
//!   HTTP implementation behind the `http-provider` feature
//! - **Simulated runtime**: a software reader fleet for development and tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use payonphone_lib::{Amount, DeviceSession, StaticTokenProvider, TerminalConfig};
//! use payonphone_lib::runtime::SimulatedTerminal;
//!
//! # async fn run() -> payonphone_lib::Result<()> {
//! let runtime = SimulatedTerminal::new();
//! let session = DeviceSession::new(
//!     runtime,
//!     Arc::new(StaticTokenProvider::new("pst_test_secret")),
//!     TerminalConfig::new("tml_main_street").simulated(),
//! );
//!
//! if let Some(scan) = session.discover_readers() {
//!     scan.wait().await;
//! }
//! let reader = session.snapshot().discovered_readers[0].clone();
//! session.connect_to_reader(reader).await?;
//!
//! let intent = session.process_payment(Amount::from_minor(1599)?, None).await?;
//! println!("captured {}", intent.display_amount());
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod intent;
pub mod reader;
pub mod runtime;
pub mod session;

/// Fixtures and recorders for session tests.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use amount::{Amount, Currency};
pub use config::{ConnectionConfiguration, DiscoveryConfiguration, DiscoveryMethod, TerminalConfig};
pub use credentials::{
    BackendConfig, BackendHealth, ConnectionToken, ConnectionTokenProvider, HttpTokenProvider,
    StaticTokenProvider,
};
pub use errors::{TerminalError, TerminalErrorCode};
pub use intent::{PaymentIntent, PaymentIntentParameters, PaymentIntentStatus};
pub use reader::{DeviceType, Reader, ReaderEvent};
pub use runtime::{ReaderError, TerminalRuntime};
pub use session::{
    ConnectionStatus, DeviceSession, DiscoveryHandle, DiscoveryOutcome, PipelineStage,
    SessionEvent, SessionSnapshot,
};

/// Common result alias for terminal operations.
pub type Result<T> = std::result::Result<T, TerminalError>;
