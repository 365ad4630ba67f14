//! Card reader peripherals and the events they push.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware family of a discovered reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Stripe Reader M2.
    StripeM2,
    /// BBPOS Chipper 2X BT.
    Chipper2X,
    /// BBPOS WisePad 3.
    WisePad3,
    /// Software reader used for development.
    Simulated,
}

impl DeviceType {
    /// Get the device type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StripeM2 => "stripe_m2",
            Self::Chipper2X => "chipper_2x",
            Self::WisePad3 => "wisepad_3",
            Self::Simulated => "simulated",
        }
    }
}

/// A discovered card reader.
///
/// Immutable once discovered; a new scan produces fresh values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reader {
    /// Reader-assigned unique identifier.
    pub id: String,
    /// Human-friendly label, if one was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Serial number. Stable key for list rendering and dedup.
    pub serial_number: String,
    /// Hardware family.
    pub device_type: DeviceType,
    /// Installed firmware version, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

impl Reader {
    /// Create a reader with no label.
    pub fn new(
        id: impl Into<String>,
        serial_number: impl Into<String>,
        device_type: DeviceType,
    ) -> Self {
        Self {
            id: id.into(),
            label: None,
            serial_number: serial_number.into(),
            device_type,
            software_version: None,
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the firmware version.
    pub fn with_software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = Some(version.into());
        self
    }

    /// Label for display, falling back to "Unknown Reader".
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("Unknown Reader")
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_label(), self.serial_number)
    }
}

/// Collapse readers sharing a serial number, keeping the first occurrence.
pub fn dedup_by_serial(readers: Vec<Reader>) -> Vec<Reader> {
    let mut seen = std::collections::HashSet::new();
    readers
        .into_iter()
        .filter(|reader| seen.insert(reader.serial_number.clone()))
        .collect()
}

/// A firmware update the reader is installing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSoftwareUpdate {
    /// Version being installed.
    pub version: String,
    /// Rough install time in seconds.
    pub estimated_seconds: u64,
}

/// Ways the reader can accept a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderInputOption {
    /// Magnetic stripe swipe.
    Swipe,
    /// Chip insert.
    Insert,
    /// Contactless tap.
    Tap,
}

/// Prompts the reader asks the app to show the cardholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderDisplayMessage {
    /// Retry the same card.
    RetryCard,
    /// Insert the card.
    InsertCard,
    /// Insert or swipe the card.
    InsertOrSwipeCard,
    /// Swipe the card.
    SwipeCard,
    /// Remove the card.
    RemoveCard,
    /// More than one contactless card in the field.
    MultipleContactlessCardsDetected,
    /// Try another read method.
    TryAnotherReadMethod,
    /// Try another card.
    TryAnotherCard,
    /// Card was removed before the read finished.
    CardRemovedTooEarly,
}

impl fmt::Display for ReaderDisplayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RetryCard => "Retry card",
            Self::InsertCard => "Insert card",
            Self::InsertOrSwipeCard => "Insert or swipe card",
            Self::SwipeCard => "Swipe card",
            Self::RemoveCard => "Remove card",
            Self::MultipleContactlessCardsDetected => "Multiple contactless cards detected",
            Self::TryAnotherReadMethod => "Try another read method",
            Self::TryAnotherCard => "Try another card",
            Self::CardRemovedTooEarly => "Card removed too early",
        };
        f.write_str(text)
    }
}

/// Asynchronous notification pushed by the reader.
///
/// Fire-and-forget: nothing acknowledges these and forwarding them never
/// blocks the hardware operation that produced them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ReaderEvent {
    /// A firmware update started installing.
    SoftwareUpdateStarted(ReaderSoftwareUpdate),
    /// Firmware install progress in `0.0..=1.0`.
    SoftwareUpdateProgress(f32),
    /// Firmware install finished, with an error message on failure.
    SoftwareUpdateFinished {
        /// Failure reason, if any.
        error: Option<String>,
    },
    /// The reader is waiting for the cardholder.
    InputRequested(Vec<ReaderInputOption>),
    /// The reader asks the app to display a message.
    DisplayMessage(ReaderDisplayMessage),
}
