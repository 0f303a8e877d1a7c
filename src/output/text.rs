//! Plain text output, one line per event or record.

use crate::cache::DeviceRecord;
use crate::mac_address::MacAddress;
use crate::output::OutputFormatter;
use std::fmt;
use std::time::SystemTime;

/// Human-readable formatter.
///
/// ```text
/// NEW DEVICE 06:05:04:03:02:01
/// 06:05:04:03:02:01 name="Dog" count=2 type=public rssi=-60 first_seen=1700000000 last_seen=1700000042
/// ```
///
/// Names come off the air, so they are quoted and escaped. Times are Unix
/// seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }
}

/// ` key=value`, or nothing when the value is absent.
struct OptionalField<'a, T>(&'a str, Option<T>);

impl<T: fmt::Display> fmt::Display for OptionalField<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.1 {
            Some(value) => write!(f, " {}={value}", self.0),
            None => Ok(()),
        }
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl OutputFormatter for TextFormatter {
    fn format_new_device(&self, mac: &MacAddress) -> String {
        format!("NEW DEVICE {mac}")
    }

    fn format_record(&self, mac: &MacAddress, record: &DeviceRecord) -> String {
        format!(
            "{mac} name={:?} count={}{}{} first_seen={} last_seen={}",
            record.name,
            record.sighting_count,
            OptionalField("type", record.address_type),
            OptionalField("rssi", record.rssi),
            unix_secs(record.first_seen),
            unix_secs(record.last_seen),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::AddressType;
    use crate::test_utils::TEST_MAC;
    use std::time::Duration;

    fn record(name: &str, sighting_count: u64, rssi: Option<i8>) -> DeviceRecord {
        DeviceRecord {
            name: name.to_string(),
            sighting_count,
            rssi,
            address_type: None,
            first_seen: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            last_seen: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_042),
        }
    }

    #[test]
    fn test_format_new_device() {
        let formatter = TextFormatter::new();
        assert_eq!(
            formatter.format_new_device(&TEST_MAC),
            "NEW DEVICE aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn test_format_record_with_rssi() {
        let formatter = TextFormatter::new();
        let line = formatter.format_record(&TEST_MAC, &record("Dog", 2, Some(-60)));
        assert_eq!(
            line,
            "aa:bb:cc:dd:ee:ff name=\"Dog\" count=2 rssi=-60 \
             first_seen=1700000000 last_seen=1700000042"
        );
    }

    #[test]
    fn test_format_record_without_rssi() {
        let formatter = TextFormatter::new();
        let line = formatter.format_record(&TEST_MAC, &record("Dog", 1, None));
        assert_eq!(
            line,
            "aa:bb:cc:dd:ee:ff name=\"Dog\" count=1 first_seen=1700000000 last_seen=1700000042"
        );
    }

    #[test]
    fn test_format_record_with_address_type() {
        let formatter = TextFormatter::new();
        let mut record = record("Dog", 3, Some(-71));
        record.address_type = Some(AddressType::Random);

        let line = formatter.format_record(&TEST_MAC, &record);
        assert_eq!(
            line,
            "aa:bb:cc:dd:ee:ff name=\"Dog\" count=3 type=random rssi=-71 \
             first_seen=1700000000 last_seen=1700000042"
        );
    }

    #[test]
    fn test_format_record_escapes_name() {
        let formatter = TextFormatter::new();
        let line = formatter.format_record(&TEST_MAC, &record("a\"b\nc", 1, None));
        assert!(line.starts_with("aa:bb:cc:dd:ee:ff name=\"a\\\"b\\nc\" count=1 "));
    }
}
