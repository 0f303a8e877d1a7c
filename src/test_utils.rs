use crate::mac_address::MacAddress;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Build a single-report LE advertising report event as read from an HCI socket.
///
/// `wire_addr` is in little-endian wire order; use [`MacAddress::to_wire`] to
/// start from a display-order address.
pub fn build_event(wire_addr: [u8; 6], ad_data: &[u8], rssi: i8) -> Vec<u8> {
    let mut event = vec![
        0x04, // HCI event packet
        0x3E, // LE meta event
        0x00, // parameter length, patched below
        0x02, // LE advertising report
        0x01, // one report
        0x00, // ADV_IND
        0x00, // public address
    ];
    event.extend_from_slice(&wire_addr);
    event.push(ad_data.len() as u8);
    event.extend_from_slice(ad_data);
    event.push(rssi as u8);
    event[2] = (event.len() - 3) as u8;
    event
}
