//! `ble-sightings` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. Decoding lives in [`crate::advertisement`] and
//! [`crate::ad_structure`], device bookkeeping in [`crate::cache`], and the
//! ingestion loop in [`crate::app`], where it can be driven by an injected
//! scanner and injected output streams.

pub mod ad_structure;
pub mod advertisement;
pub mod app;
pub mod cache;
pub mod mac_address;
pub mod output;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use ad_structure::{AdData, AdField, AdFields, decode_fields, encode_fields};
pub use advertisement::{AddressType, Advertisement, DecodeError};
pub use cache::{DeviceCache, DeviceRecord, Sighting};
pub use mac_address::MacAddress;
pub use output::OutputFormatter;
pub use output::text::TextFormatter;
pub use scanner::{Backend, EventResult, RawEvent, ScanError};
