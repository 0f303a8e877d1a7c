//! Per-device sighting cache.
//!
//! The cache is an owned value held by the ingestion loop. Records are never
//! evicted, so memory grows with the number of distinct advertisers seen.

use crate::ad_structure::AdField;
use crate::advertisement::{AddressType, Advertisement};
use crate::mac_address::MacAddress;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// What is known about one advertiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Last advertised local name, or the address until one is seen.
    pub name: String,
    /// Number of advertising reports received from this address.
    pub sighting_count: u64,
    /// Most recent RSSI in dBm, if any report carried one.
    pub rssi: Option<i8>,
    /// Address type from the most recent report that carried one.
    pub address_type: Option<AddressType>,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
}

impl DeviceRecord {
    fn new(mac: MacAddress, seen: SystemTime) -> Self {
        Self {
            name: mac.to_string(),
            sighting_count: 0,
            rssi: None,
            address_type: None,
            first_seen: seen,
            last_seen: seen,
        }
    }
}

/// Result of recording one sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting<'c> {
    pub mac: MacAddress,
    /// The record after the update.
    pub record: &'c DeviceRecord,
    /// `true` when this sighting created the record.
    pub is_new: bool,
}

struct Observation {
    address_type: Option<AddressType>,
    rssi: Option<i8>,
    seen: SystemTime,
}

/// Device records keyed by address.
#[derive(Debug, Default)]
pub struct DeviceCache {
    devices: BTreeMap<MacAddress, DeviceRecord>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sighting of `mac` carrying the given decoded fields,
    /// timestamped now.
    ///
    /// Creates the record on first sighting, bumps the sighting count, and
    /// lets every local name field overwrite the stored name in order, so the
    /// last one wins. Shortened and complete names are treated alike.
    pub fn record_sighting(&mut self, mac: MacAddress, fields: &[AdField<'_>]) -> Sighting<'_> {
        let observation = Observation {
            address_type: None,
            rssi: None,
            seen: SystemTime::now(),
        };
        self.upsert(mac, fields, observation)
    }

    /// Like [`record_sighting`](Self::record_sighting) for a report received
    /// at `seen`, also keeping the advertisement's address type and RSSI.
    pub fn record_advertisement(
        &mut self,
        advertisement: &Advertisement<'_>,
        fields: &[AdField<'_>],
        seen: SystemTime,
    ) -> Sighting<'_> {
        let observation = Observation {
            address_type: Some(advertisement.address_type),
            rssi: advertisement.rssi,
            seen,
        };
        self.upsert(advertisement.mac, fields, observation)
    }

    fn upsert(
        &mut self,
        mac: MacAddress,
        fields: &[AdField<'_>],
        observation: Observation,
    ) -> Sighting<'_> {
        let mut is_new = false;
        let record = self.devices.entry(mac).or_insert_with(|| {
            is_new = true;
            DeviceRecord::new(mac, observation.seen)
        });

        record.sighting_count += 1;
        // A clock step backwards never rewinds the record
        record.last_seen = record.last_seen.max(observation.seen);

        for name in fields.iter().filter_map(AdField::local_name) {
            record.name.clear();
            record.name.push_str(name);
        }

        if observation.address_type.is_some() {
            record.address_type = observation.address_type;
        }
        if observation.rssi.is_some() {
            record.rssi = observation.rssi;
        }

        Sighting {
            mac,
            record,
            is_new,
        }
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&DeviceRecord> {
        self.devices.get(mac)
    }

    /// Records in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&MacAddress, &DeviceRecord)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
