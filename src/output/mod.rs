//! Output formatters for device notifications and cache dumps.
//!
//! The ingestion loop only deals in strings: a formatter decides what a
//! "new device" line and a dumped record look like.

pub mod text;

use crate::cache::DeviceRecord;
use crate::mac_address::MacAddress;

/// Trait for turning cache events into output lines.
pub trait OutputFormatter: Send + Sync {
    /// Line announcing an address seen for the first time.
    fn format_new_device(&self, mac: &MacAddress) -> String;

    /// Line describing one cached device, used by the periodic dump.
    fn format_record(&self, mac: &MacAddress, record: &DeviceRecord) -> String;
}
