//! Locates the advertiser address, advertising data and RSSI inside one raw
//! HCI LE advertising report event.
//!
//! The buffer is the packet exactly as read from the HCI socket:
//!
//! ```text
//! [0]  packet type (0x04)      [5]  event type
//! [1]  event code (0x3E)       [6]  address type
//! [2]  parameter length        [7..13]  address, little-endian
//! [3]  subevent (0x02)         [13] advertising data length
//! [4]  report count            [14..len-1] advertising data
//!                              [len-1] RSSI
//! ```
//!
//! Only the first report of an event is read.

use crate::ad_structure::{AdFields, decode_fields};
use crate::mac_address::{MAC_LEN, MacAddress};
use std::fmt;
use thiserror::Error;

/// Offset of the advertiser address type.
pub const ADDRESS_TYPE_OFFSET: usize = 6;

/// Offset of the little-endian advertiser address.
pub const ADDRESS_OFFSET: usize = 7;

/// Offset where the advertising data (TLV section) begins.
pub const AD_DATA_OFFSET: usize = 14;

/// Shortest buffer that still has the fixed header plus the trailing RSSI byte.
pub const MIN_EVENT_LEN: usize = AD_DATA_OFFSET + 1;

/// RSSI value the controller reports when no measurement is available.
pub const RSSI_UNAVAILABLE: i8 = 127;

/// Errors raised while decoding a single advertising report.
///
/// None of these are fatal: the ingestion loop reports them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The event is too short to hold the fixed report header.
    #[error("malformed event: {len} bytes is too short for an advertising report")]
    MalformedEvent { len: usize },
    /// A field's declared length runs past the end of the advertising data.
    #[error(
        "truncated field at offset {offset}: length {declared} declared, {available} bytes left"
    )]
    TruncatedField {
        offset: usize,
        declared: u8,
        available: usize,
    },
    /// A local name field does not hold valid UTF-8.
    #[error("invalid UTF-8 in AD type 0x{ad_type:02x} at offset {offset}")]
    InvalidEncoding { offset: usize, ad_type: u8 },
}

/// Kind of advertiser address, as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
    Other(u8),
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => AddressType::Public,
            0x01 => AddressType::Random,
            0x02 => AddressType::PublicIdentity,
            0x03 => AddressType::RandomIdentity,
            other => AddressType::Other(other),
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public"),
            AddressType::Random => write!(f, "random"),
            AddressType::PublicIdentity => write!(f, "public-identity"),
            AddressType::RandomIdentity => write!(f, "random-identity"),
            AddressType::Other(value) => write!(f, "0x{value:02x}"),
        }
    }
}

/// The parts of a raw event the device cache cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertisement<'a> {
    /// Advertiser address, already in display order.
    pub mac: MacAddress,
    pub address_type: AddressType,
    /// Advertising data section, TLV encoded.
    pub ad_data: &'a [u8],
    /// Received signal strength in dBm, if the controller measured it.
    pub rssi: Option<i8>,
}

impl<'a> Advertisement<'a> {
    /// Split a raw HCI event into address, advertising data and RSSI.
    ///
    /// # Errors
    /// Returns [`DecodeError::MalformedEvent`] when the buffer is shorter than
    /// [`MIN_EVENT_LEN`].
    pub fn parse(event: &'a [u8]) -> Result<Self, DecodeError> {
        let malformed = || DecodeError::MalformedEvent { len: event.len() };

        if event.len() < MIN_EVENT_LEN {
            return Err(malformed());
        }

        let (&rssi, body) = event.split_last().ok_or_else(malformed)?;

        let address_type = body
            .get(ADDRESS_TYPE_OFFSET)
            .copied()
            .map(AddressType::from)
            .ok_or_else(malformed)?;

        let wire: [u8; MAC_LEN] = body
            .get(ADDRESS_OFFSET..ADDRESS_OFFSET + MAC_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(malformed)?;

        let ad_data = body.get(AD_DATA_OFFSET..).ok_or_else(malformed)?;

        let rssi = rssi as i8;
        Ok(Self {
            mac: MacAddress::from_wire(wire),
            address_type,
            ad_data,
            rssi: (rssi != RSSI_UNAVAILABLE).then_some(rssi),
        })
    }

    /// Lazily decode the advertising data section.
    pub fn fields(&self) -> AdFields<'a> {
        decode_fields(self.ad_data)
    }
}
