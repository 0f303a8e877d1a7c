//! Core ingestion loop for `ble-sightings`.
//!
//! Decoupled from CLI parsing and process exit codes so it can be driven by a
//! fake scanner and in-memory output streams in tests.

use crate::ad_structure::AdField;
use crate::advertisement::{Advertisement, DecodeError};
use crate::cache::DeviceCache;
use crate::output::OutputFormatter;
use crate::output::text::TextFormatter;
use crate::scanner::{Backend, EventResult, ScanError};
use clap::Parser;
use log::{Level, debug, info, log_enabled};
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default number of events between full cache dumps.
pub const DEFAULT_REPORT_EVERY: u64 = 100;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// HCI device index to scan on (0 for hci0)
    #[arg(long, default_value_t = 0)]
    pub device: u16,

    /// Dump the whole device cache after every N received events
    #[arg(long, default_value_t = DEFAULT_REPORT_EVERY, value_parser = clap::value_parser!(u64).range(1..))]
    pub report_every: u64,

    /// Verbose output, print decode errors for malformed advertisements
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        dev_id: u16,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<EventResult>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        dev_id: u16,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<EventResult>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(backend, dev_id).await })
    }
}

fn report_decode_error(
    error: &DecodeError,
    context: &dyn std::fmt::Display,
    verbose: bool,
    err: &mut dyn Write,
) -> io::Result<()> {
    debug!("{context}: {error}");
    if verbose {
        writeln!(err, "{context}: {error}")?;
    }
    Ok(())
}

/// Decode one raw event received at `seen` and fold it into the cache.
///
/// Malformed events leave the cache untouched. Fields decoded before a
/// truncation, and fields next to an invalid name, are still applied.
/// A new-device line is written to `out` the first time an address shows up.
pub fn ingest_event(
    cache: &mut DeviceCache,
    event: &[u8],
    seen: SystemTime,
    formatter: &dyn OutputFormatter,
    verbose: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    let advertisement = match Advertisement::parse(event) {
        Ok(advertisement) => advertisement,
        Err(error) => return report_decode_error(&error, &"event", verbose, err),
    };

    let mut fields: Vec<AdField<'_>> = Vec::new();
    for field in advertisement.fields() {
        match field {
            Ok(field) => fields.push(field),
            Err(error) => report_decode_error(&error, &advertisement.mac, verbose, err)?,
        }
    }

    if log_enabled!(Level::Debug) {
        let rendered: Vec<String> = fields.iter().map(ToString::to_string).collect();
        debug!("{} > {}", advertisement.mac, rendered.join(" "));
    }

    let sighting = cache.record_advertisement(&advertisement, &fields, seen);
    if sighting.is_new {
        info!("new device {}", sighting.mac);
        writeln!(out, "{}", formatter.format_new_device(&sighting.mac))?;
    }

    Ok(())
}

/// Write a full dump of the cache: a blank line, then one line per device.
pub fn write_report(
    cache: &DeviceCache,
    formatter: &dyn OutputFormatter,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out)?;
    for (mac, record) in cache.iter() {
        writeln!(out, "{}", formatter.format_record(mac, record))?;
    }
    Ok(())
}

/// Run the ingestion loop until the scanner's stream ends.
///
/// - Every event is decoded and recorded; new addresses get a line on `out`.
/// - Every `options.report_every` events the whole cache is dumped to `out`.
/// - Decode errors go to `err` only when `options.verbose` is true.
/// - A scanner error ends the loop and is returned.
///
/// Returns the cache as it stood when the stream ended.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<DeviceCache, RunError> {
    let formatter = TextFormatter::new();
    let report_every = options.report_every.max(1);
    let mut cache = DeviceCache::new();
    let mut received: u64 = 0;

    let mut events = scanner.start_scan(options.backend, options.device).await?;

    while let Some(event) = events.recv().await {
        let event = event?;
        let seen = SystemTime::now();
        ingest_event(&mut cache, &event, seen, &formatter, options.verbose, out, err)?;

        received += 1;
        if received % report_every == 0 {
            write_report(&cache, &formatter, out)?;
        }
    }

    Ok(cache)
}
