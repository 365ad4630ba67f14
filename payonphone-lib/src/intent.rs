//! Payment intents: one record per charge attempt.

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Currency};

/// When collected funds are captured.
///
/// Only automatic capture is supported: a successful process step claims
/// the funds, there is no separate manual capture call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    /// Capture as soon as the payment is processed.
    #[default]
    Automatic,
}

/// Lifecycle of an intent: created, method collected, captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    /// Created, waiting for a card.
    RequiresPaymentMethod,
    /// Card collected, waiting to be processed.
    RequiresConfirmation,
    /// Processed and captured.
    Succeeded,
    /// Canceled upstream.
    Canceled,
}

impl PaymentIntentStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }
}

/// Parameters for creating an intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentParameters {
    /// Amount in minor units.
    pub amount: Amount,
    /// Lowercase ISO 4217 code.
    pub currency: Currency,
    /// Always automatic.
    pub capture_method: CaptureMethod,
}

impl PaymentIntentParameters {
    /// Create parameters with automatic capture.
    pub fn new(amount: Amount, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            capture_method: CaptureMethod::Automatic,
        }
    }
}

/// Card details attached once a payment method is collected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPresentDetails {
    /// Card network brand ("visa", "mastercard").
    pub brand: String,
    /// Last four digits of the card number.
    pub last4: String,
}

/// A single charge attempt.
///
/// Created fresh for every charge request and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Intent identifier assigned at creation.
    pub id: String,
    /// Amount in minor units.
    pub amount: Amount,
    /// Lowercase ISO 4217 code.
    pub currency: Currency,
    /// Always automatic.
    pub capture_method: CaptureMethod,
    /// Current lifecycle status.
    pub status: PaymentIntentStatus,
    /// Card used, once collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardPresentDetails>,
    /// Creation time (unix epoch seconds).
    pub created_at: i64,
}

impl PaymentIntent {
    /// Create an intent awaiting a payment method.
    pub fn new(id: impl Into<String>, params: &PaymentIntentParameters) -> Self {
        Self {
            id: id.into(),
            amount: params.amount,
            currency: params.currency.clone(),
            capture_method: params.capture_method,
            status: PaymentIntentStatus::RequiresPaymentMethod,
            card: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Amount formatted in major units with the currency code ("15.99 usd").
    pub fn display_amount(&self) -> String {
        format!(
            "{} {}",
            self.amount.format_major(&self.currency),
            self.currency
        )
    }
}
