//! Published session state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::intent::PaymentIntent;
use crate::reader::Reader;

/// Reader connection status. Exactly one value at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No reader connected.
    #[default]
    NotConnected,
    /// A connect request is outstanding.
    Connecting,
    /// A reader is connected and can take payments.
    Connected,
}

impl ConnectionStatus {
    /// Check if charges are allowed in this status.
    pub fn can_charge(&self) -> bool {
        *self == Self::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotConnected => "Not Connected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
        };
        f.write_str(text)
    }
}

/// Everything observers can read about a session.
///
/// Each published value is a consistent snapshot; observers never see a
/// half-applied transition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current connection status.
    pub connection_status: ConnectionStatus,
    /// Readers from the latest discovery update, in reported order.
    pub discovered_readers: Vec<Reader>,
    /// Set only while `connection_status` is `Connected`.
    pub connected_reader: Option<Reader>,
    /// Most recent successfully captured intent.
    pub last_payment_intent: Option<PaymentIntent>,
    /// True while a discovery scan is running.
    pub is_discovering: bool,
    /// True while a payment pipeline is running.
    pub payment_in_progress: bool,
}

impl SessionSnapshot {
    /// Check the reader/status invariant: a reader is set iff connected.
    pub fn is_consistent(&self) -> bool {
        self.connected_reader.is_some() == (self.connection_status == ConnectionStatus::Connected)
    }

    /// Status line for display ("Connected to Reader A").
    pub fn status_text(&self) -> String {
        match (&self.connection_status, &self.connected_reader) {
            (ConnectionStatus::Connected, Some(reader)) => {
                format!("Connected to {}", reader.label.as_deref().unwrap_or("Reader"))
            }
            (status, _) => status.to_string(),
        }
    }
}
