//! Replay backend: hex-encoded HCI events read from stdin.
//!
//! Each line holds one event packet, packet type byte first, e.g. as printed
//! by `hcidump -R` with the leading `>` removed:
//!
//! ```text
//! 04 3E 14 02 01 00 00 06 05 04 03 02 01 08 02 01 06 04 09 44 6F 67 C4
//! ```
//!
//! Bytes may be separated by spaces, colons or dashes, or written back to
//! back. Blank lines and lines starting with `#` are ignored.

use super::{
    EVENT_CHANNEL_BUFFER_SIZE, EventResult, RawEvent, ScanError, is_le_advertising_report,
};
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Parse one line of hex into an event buffer.
///
/// Returns `Ok(None)` for blank and comment lines.
///
/// # Examples
/// ```
/// use ble_sightings::scanner::hex::parse_hex_line;
///
/// assert_eq!(parse_hex_line("04 3e:0A").unwrap(), Some(vec![0x04, 0x3e, 0x0a]));
/// assert_eq!(parse_hex_line("043e0a").unwrap(), Some(vec![0x04, 0x3e, 0x0a]));
/// assert_eq!(parse_hex_line("# comment").unwrap(), None);
/// ```
pub fn parse_hex_line(line: &str) -> Result<Option<RawEvent>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let digits: Vec<u8> = line
        .bytes()
        .filter(|b| !matches!(b, b' ' | b'\t' | b':' | b'-'))
        .collect();

    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits: {line}"));
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex byte '{}'", String::from_utf8_lossy(pair)))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(Some)
}

/// Forward every advertising report found in `reader` to `tx`.
///
/// Unparseable lines and non-report events are skipped. Ends at EOF, when the
/// receiver is dropped, or after forwarding a read error.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<EventResult>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(ScanError::Input(e.to_string()))).await;
                break;
            }
        };
        line_no += 1;

        let event = match parse_hex_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("line {line_no}: {e}");
                continue;
            }
        };

        if !is_le_advertising_report(&event) {
            warn!("line {line_no}: not an LE advertising report event");
            continue;
        }

        if tx.send(Ok(event)).await.is_err() {
            break;
        }
    }
}

/// Start replaying events from stdin.
pub async fn start_scan() -> Result<mpsc::Receiver<EventResult>, ScanError> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    info!("replaying hex-encoded HCI events from stdin");
    tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), tx));

    Ok(rx)
}
