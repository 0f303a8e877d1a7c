//! Sources of raw HCI advertising report events.
//!
//! Each backend runs in its own task and pushes raw event buffers through a
//! bounded channel. The receiving side owns all decoding and cache state.

#[cfg(feature = "hci")]
pub mod hci;

pub mod hex;

use thiserror::Error;
use tokio::sync::mpsc;

/// One HCI event packet exactly as read, packet type byte included.
pub type RawEvent = Vec<u8>;

/// Convenience alias for events or the error that ended the stream.
pub type EventResult = Result<RawEvent, ScanError>;

/// Error type for scanner operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// Reading replayed events failed
    #[error("Input error: {0}")]
    Input(String),
}

/// HCI packet type for events.
pub const HCI_EVENT_PKT: u8 = 0x04;

/// HCI LE Meta event code.
pub const EVT_LE_META_EVENT: u8 = 0x3E;

/// LE Meta subevent: advertising report.
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

/// Channel buffer size for raw events.
pub const EVENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Raw HCI socket backend (direct kernel access, needs CAP_NET_RAW/CAP_NET_ADMIN)
    #[cfg(feature = "hci")]
    Hci,
    /// Replay hex-encoded events from stdin, one per line
    Hex,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "hci")]
        return Backend::Hci;
        #[cfg(not(feature = "hci"))]
        return Backend::Hex;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            Backend::Hex => write!(f, "hex"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            "hex" | "replay" => Ok(Backend::Hex),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Whether a buffer is an LE advertising report event.
///
/// The HCI socket filter already restricts traffic to LE meta events; this
/// also drops the other LE subevents and anything replayed that is not a
/// report.
pub fn is_le_advertising_report(event: &[u8]) -> bool {
    matches!(
        event,
        [HCI_EVENT_PKT, EVT_LE_META_EVENT, _, EVT_LE_ADVERTISING_REPORT, ..]
    )
}

/// Start receiving advertising report events from the given backend.
///
/// # Arguments
/// * `backend` - The scanner backend to use
/// * `dev_id` - HCI device index (`hci0` is 0); ignored by the replay backend
///
/// # Returns
/// A receiver of raw events. A `ScanError` item means the source failed and
/// no more events follow.
pub async fn start_scan(
    backend: Backend,
    dev_id: u16,
) -> Result<mpsc::Receiver<EventResult>, ScanError> {
    match backend {
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan(dev_id).await,
        Backend::Hex => {
            let _ = dev_id;
            hex::start_scan().await
        }
    }
}
