//! Compact MAC address type for BLE advertisers.
//!
//! HCI events carry the advertiser address little-endian. [`MacAddress`]
//! stores the bytes in display order so formatting, ordering and parsing all
//! agree with the familiar `aa:bb:cc:dd:ee:ff` form.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// Number of octets in a Bluetooth device address.
pub const MAC_LEN: usize = 6;

/// A Bluetooth device address stored as a 6-byte array in display order.
///
/// Cheap to copy and hash, so it is used directly as the device cache key.
///
/// Raw bytes always need an explicit order: the tuple field takes display
/// order and [`MacAddress::from_wire`] takes HCI wire order.
///
/// ```
/// use ble_sightings::MacAddress;
///
/// let wire = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
/// assert_eq!(MacAddress::from_wire(wire).to_string(), "06:05:04:03:02:01");
/// assert_eq!(MacAddress(wire).to_string(), "01:02:03:04:05:06");
/// ```
///
/// ```compile_fail
/// let _ = ble_sightings::MacAddress::from([0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    /// Build an address from the little-endian byte order used on the HCI wire.
    pub fn from_wire(mut bytes: [u8; MAC_LEN]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// The address in wire (little-endian) byte order.
    pub fn to_wire(self) -> [u8; MAC_LEN] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address: expected 6 parts, got {0}")]
    InvalidLength(usize),
    #[error("invalid MAC address: part {0} has wrong length")]
    InvalidPartLength(usize),
    #[error("invalid MAC address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != MAC_LEN {
            return Err(ParseMacError::InvalidLength(parts.len()));
        }

        let mut bytes = [0u8; MAC_LEN];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidPartLength(i));
            }
            // from_str_radix alone would also take a sign
            if !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseMacError::InvalidHex(part.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::InvalidHex(part.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}
