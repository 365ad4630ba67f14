//! Error types for terminal operations.
//!
//! Every failure the session can report maps onto one variant of
//! [`TerminalError`]. None of them is fatal: after any error the session
//! stays usable and falls back to its pre-operation status, except where a
//! variant's docs say otherwise.

use std::fmt;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TerminalErrorCode {
    /// Feature not compiled in
    Unimplemented = 1000,
    /// Connection credential could not be minted
    CredentialFetch = 2000,
    /// Reader discovery failed
    Discovery = 3000,
    /// Connecting to a reader failed
    Connection = 3001,
    /// Disconnecting from a reader failed
    Disconnect = 3002,
    /// Operation requires a connected reader
    NoReaderConnected = 3003,
    /// Payment intent could not be created
    IntentCreation = 4000,
    /// Card could not be collected
    MethodCollection = 4001,
    /// Collected payment could not be captured
    Capture = 4002,
    /// A payment pipeline is already running
    PaymentInProgress = 4003,
    /// Invalid amount
    InvalidAmount = 5000,
    /// Invalid currency code
    InvalidCurrency = 5001,
    /// Invalid or missing configuration
    Configuration = 5002,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for terminal operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalError {
    /// Feature not compiled in.
    Unimplemented(&'static str),

    /// The credential backend could not mint a connection token.
    CredentialFetch {
        /// Underlying cause (network, status code, malformed body)
        reason: String,
    },

    /// Reader discovery failed. Logged and reported, never fatal.
    Discovery(String),

    /// Connecting to a reader failed. Status is reset to not connected.
    Connection {
        /// Serial number of the reader we tried to reach
        serial_number: String,
        /// Underlying error message
        reason: String,
    },

    /// Disconnecting failed. The published status is left as it was.
    Disconnect(String),

    /// A charge was requested without a connected reader.
    NoReaderConnected,

    /// The payment intent could not be created.
    IntentCreation(String),

    /// The card could not be collected for an intent.
    MethodCollection {
        /// Intent that was abandoned
        intent_id: String,
        /// Underlying error message
        reason: String,
    },

    /// The collected payment could not be captured.
    Capture {
        /// Intent that failed to capture
        intent_id: String,
        /// Underlying error message
        reason: String,
    },

    /// Another payment pipeline is still running.
    PaymentInProgress,

    /// Invalid amount provided.
    InvalidAmount {
        /// The rejected input
        input: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid ISO 4217 currency code.
    InvalidCurrency(String),

    /// Configuration is missing or malformed.
    Configuration(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl TerminalError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> TerminalErrorCode {
        match self {
            Self::Unimplemented(_) => TerminalErrorCode::Unimplemented,
            Self::CredentialFetch { .. } => TerminalErrorCode::CredentialFetch,
            Self::Discovery(_) => TerminalErrorCode::Discovery,
            Self::Connection { .. } => TerminalErrorCode::Connection,
            Self::Disconnect(_) => TerminalErrorCode::Disconnect,
            Self::NoReaderConnected => TerminalErrorCode::NoReaderConnected,
            Self::IntentCreation(_) => TerminalErrorCode::IntentCreation,
            Self::MethodCollection { .. } => TerminalErrorCode::MethodCollection,
            Self::Capture { .. } => TerminalErrorCode::Capture,
            Self::PaymentInProgress => TerminalErrorCode::PaymentInProgress,
            Self::InvalidAmount { .. } => TerminalErrorCode::InvalidAmount,
            Self::InvalidCurrency(_) => TerminalErrorCode::InvalidCurrency,
            Self::Configuration(_) => TerminalErrorCode::Configuration,
            Self::Internal(_) => TerminalErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the caller may reasonably retry the operation.
    ///
    /// The session itself never retries; this is a hint for the UI.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CredentialFetch { .. }
                | Self::Discovery(_)
                | Self::Connection { .. }
                | Self::Disconnect(_)
                | Self::PaymentInProgress
        )
    }

    /// Returns true if the error aborted a payment pipeline.
    pub fn is_payment_failure(&self) -> bool {
        matches!(
            self,
            Self::IntentCreation(_) | Self::MethodCollection { .. } | Self::Capture { .. }
        )
    }

    /// Create a credential fetch error from any error type.
    pub fn credential<E: fmt::Display>(err: E) -> Self {
        Self::CredentialFetch {
            reason: err.to_string(),
        }
    }

    /// Create an invalid amount error.
    pub fn invalid_amount(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TerminalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unimplemented(label) => write!(f, "{} is not implemented", label),
            Self::CredentialFetch { reason } => {
                write!(f, "credential fetch failed: {}", reason)
            }
            Self::Discovery(msg) => write!(f, "discovery failed: {}", msg),
            Self::Connection {
                serial_number,
                reason,
            } => {
                write!(f, "connection to reader {} failed: {}", serial_number, reason)
            }
            Self::Disconnect(msg) => write!(f, "disconnect failed: {}", msg),
            Self::NoReaderConnected => write!(f, "no reader connected"),
            Self::IntentCreation(msg) => write!(f, "intent creation failed: {}", msg),
            Self::MethodCollection { intent_id, reason } => {
                write!(f, "collection failed for {}: {}", intent_id, reason)
            }
            Self::Capture { intent_id, reason } => {
                write!(f, "payment failed for {}: {}", intent_id, reason)
            }
            Self::PaymentInProgress => write!(f, "a payment is already in progress"),
            Self::InvalidAmount { input, reason } => {
                write!(f, "invalid amount '{}': {}", input, reason)
            }
            Self::InvalidCurrency(code) => write!(f, "invalid currency code: {}", code),
            Self::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for TerminalError {}

impl From<serde_json::Error> for TerminalError {
    fn from(err: serde_json::Error) -> Self {
        Self::credential(format!("invalid response format: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = TerminalError::credential("connection refused");
        assert_eq!(err.code(), TerminalErrorCode::CredentialFetch);
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("credential fetch failed"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_payment_failures_are_not_retryable() {
        let err = TerminalError::Capture {
            intent_id: "pi_1".to_string(),
            reason: "card declined".to_string(),
        };
        assert!(err.is_payment_failure());
        assert!(!err.is_retryable());
        assert_eq!(err.code() as i32, 4002);
    }

    #[test]
    fn test_precondition_failure() {
        let err = TerminalError::NoReaderConnected;
        assert_eq!(err.code(), TerminalErrorCode::NoReaderConnected);
        assert!(!err.is_payment_failure());
        assert_eq!(err.message(), "no reader connected");
    }

    #[test]
    fn test_helper_constructors() {
        let err = TerminalError::invalid_amount("-1", "must be positive");
        assert_eq!(err.code(), TerminalErrorCode::InvalidAmount);
        assert!(err.to_string().contains("must be positive"));
    }
}
