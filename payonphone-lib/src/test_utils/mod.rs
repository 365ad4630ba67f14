//! Test utilities for sessions.
//!
//! - Reader and intent fixtures
//! - Credential providers with scripted behavior
//! - An event recorder for session observers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payonphone_lib::test_utils::{connected_session, EventRecorder};
//!
//! let (session, sim) = connected_session(SimulatorConfig::default()).await;
//! let recorder = EventRecorder::attach(&session);
//! session.process_payment(Amount::from_minor(1599)?, None).await?;
//! assert_eq!(recorder.count(|e| matches!(e, SessionEvent::PaymentSucceeded(_))), 1);
//! ```

mod fixtures;
mod recorder;

pub use fixtures::{
    connected_session, fixture_reader, simulated_session, CountingTokenProvider,
    FailingTokenProvider,
};
pub use recorder::EventRecorder;
