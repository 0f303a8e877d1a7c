//! Raw HCI socket backend.
//!
//! Talks to the controller through raw Linux HCI sockets, without the BlueZ
//! daemon. It requires CAP_NET_RAW and CAP_NET_ADMIN capabilities or root
//! privileges.

use super::{
    EVENT_CHANNEL_BUFFER_SIZE, EVT_LE_META_EVENT, EventResult, HCI_EVENT_PKT, ScanError,
    is_le_advertising_report,
};
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::{debug, error, info};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;
const HCI_CHANNEL_RAW: u16 = 0;

// HCI command packet type
const HCI_COMMAND_PKT: u8 = 0x01;

// Packet type + event header + 255 parameter bytes
const HCI_MAX_EVENT_SIZE: usize = 258;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan parameters
const LE_SCAN_PASSIVE: u8 = 0x00;
const LE_SCAN_INTERVAL: u16 = 0x0010; // 10ms in 0.625ms units
const LE_SCAN_WINDOW: u16 = 0x0010;
const LE_PUBLIC_ADDRESS: u8 = 0x00;
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// Parameters of LE Set Scan Parameters, little-endian on the wire
fn scan_parameters(scan_type: u8, interval: u16, window: u16) -> [u8; 7] {
    let [i0, i1] = interval.to_le_bytes();
    let [w0, w1] = window.to_le_bytes();
    [
        scan_type,
        i0,
        i1,
        w0,
        w1,
        LE_PUBLIC_ADDRESS,
        FILTER_POLICY_ACCEPT_ALL,
    ]
}

/// Open a raw HCI socket
fn open_hci_socket() -> Result<OwnedFd, ScanError> {
    // SOCK_NONBLOCK is required for AsyncFd to work properly
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };

    if fd < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to create HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind HCI socket to a device
fn bind_hci_socket(fd: &OwnedFd, dev_id: u16) -> Result<(), ScanError> {
    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: HCI_CHANNEL_RAW,
    };

    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to bind HCI socket to hci{dev_id}: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Only let event packets carrying LE meta events through
fn set_hci_filter(fd: &OwnedFd) -> Result<(), ScanError> {
    let mut filter = HciFilter::new();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_HCI,
            HCI_FILTER,
            &filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to set HCI filter: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Send an HCI command
fn send_hci_command(fd: &OwnedFd, packet: &[u8]) -> Result<(), ScanError> {
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "Failed to send HCI command: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

fn set_scan_enable(fd: &OwnedFd, enable: bool) -> Result<(), ScanError> {
    // Duplicates are not filtered: every report counts as a sighting
    let params = [u8::from(enable), 0x00];
    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &params);
    send_hci_command(fd, &packet)
}

/// Configure passive LE scanning and turn it on
fn configure_le_scan(fd: &OwnedFd) -> Result<(), ScanError> {
    // A scan left running by someone else makes the parameter change fail
    if let Err(e) = set_scan_enable(fd, false) {
        debug!("could not stop previous scan: {e}");
    }

    let params = scan_parameters(LE_SCAN_PASSIVE, LE_SCAN_INTERVAL, LE_SCAN_WINDOW);
    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params);
    send_hci_command(fd, &packet)?;

    set_scan_enable(fd, true)
}

/// Read event packets from `async_fd` and forward advertising reports to `tx`.
///
/// Returns when the receiver is dropped, or after sending a final error when
/// the socket fails or reaches end of stream.
async fn forward_events<T: AsRawFd>(async_fd: AsyncFd<T>, tx: mpsc::Sender<EventResult>) {
    let mut buf = [0u8; HCI_MAX_EVENT_SIZE];

    loop {
        // Wait for the socket to be readable
        let mut guard = match async_fd.readable().await {
            Ok(guard) => guard,
            Err(e) => {
                error!("HCI socket poll failed: {e}");
                let _ = tx
                    .send(Err(ScanError::Bluetooth(format!(
                        "Failed to poll HCI socket: {e}"
                    ))))
                    .await;
                return;
            }
        };

        // Drain all available packets before waiting again
        loop {
            let n = match guard.try_io(|inner| {
                let ret = unsafe {
                    libc::read(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut c_void,
                        buf.len(),
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(ret as usize)
                }
            }) {
                Ok(Ok(0)) => {
                    // End of stream: the fd stays readable from here on
                    error!("HCI socket closed");
                    let _ = tx
                        .send(Err(ScanError::Bluetooth("HCI socket closed".to_string())))
                        .await;
                    return;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    error!("HCI socket read failed: {e}");
                    let _ = tx
                        .send(Err(ScanError::Bluetooth(format!(
                            "Failed to read HCI socket: {e}"
                        ))))
                        .await;
                    return;
                }
                Err(_) => break, // WouldBlock - no more data
            };

            let event = &buf[..n];
            if is_le_advertising_report(event) && tx.send(Ok(event.to_vec())).await.is_err() {
                // Receiver gone, stop scanning
                return;
            }
        }
    }
}

/// Start receiving LE advertising reports from a raw HCI socket.
///
/// Opens a raw HCI socket, configures passive LE scanning and forwards every
/// advertising report event through the returned channel. Runs until the
/// receiver is dropped or the socket fails.
///
/// # Arguments
/// * `dev_id` - HCI device index (`hci0` is 0)
///
/// # Returns
/// A receiver of raw events. A read failure is sent as a final `Err`.
///
/// # Requirements
/// - CAP_NET_RAW and CAP_NET_ADMIN capabilities or root privileges
/// - An available HCI device
pub async fn start_scan(dev_id: u16) -> Result<mpsc::Receiver<EventResult>, ScanError> {
    // Open and configure HCI socket for receiving events
    let fd = open_hci_socket()?;
    bind_hci_socket(&fd, dev_id)?;
    set_hci_filter(&fd)?;

    // We need a separate socket for sending commands (bound to specific device)
    let cmd_fd = open_hci_socket()?;
    bind_hci_socket(&cmd_fd, dev_id)?;
    configure_le_scan(&cmd_fd)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    // Wrap in AsyncFd for async I/O
    let async_fd = AsyncFd::new(fd)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to create async fd: {}", e)))?;

    info!("scanning for LE advertisements on hci{dev_id}");

    // Spawn a task to read and forward HCI events
    tokio::spawn(async move {
        let _cmd_fd = cmd_fd; // Keep command socket alive
        forward_events(async_fd, tx).await;
    });

    Ok(rx)
}
