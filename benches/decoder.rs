//! Benchmark suite for event extraction and AD structure decoding.
//!
//! Runs without the async runtime so only the decoding logic is measured.

use ble_sightings::{Advertisement, AdField, DeviceCache, decode_fields};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::SystemTime;

fn typical_ad_data() -> Vec<u8> {
    vec![
        0x02, 0x01, 0x06, // Flags
        0x03, 0x03, 0xAA, 0xFE, // Complete 16-bit service UUIDs
        0x08, 0x09, b'S', b'e', b'n', b's', b'o', b'r', b'1', // Complete local name
        0x05, 0xFF, 0x4C, 0x00, 0x10, 0x05, // Manufacturer data
    ]
}

/// Longest legacy advertising payload (31 bytes), mostly manufacturer data
fn full_ad_data() -> Vec<u8> {
    let mut data = vec![0x02, 0x01, 0x06, 0x1B, 0xFF];
    data.extend(0..26u8);
    data
}

fn raw_event(ad_data: &[u8]) -> Vec<u8> {
    let mut event = vec![0x04, 0x3E, 0x00, 0x02, 0x01, 0x00, 0x00, 1, 2, 3, 4, 5, 6];
    event.push(ad_data.len() as u8);
    event.extend_from_slice(ad_data);
    event.push(0xC4);
    event[2] = (event.len() - 3) as u8;
    event
}

fn bench_decode_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_fields");
    group.throughput(Throughput::Elements(1));

    let typical = typical_ad_data();
    group.bench_function("typical", |b| {
        b.iter(|| decode_fields(black_box(&typical)).count())
    });

    let full = full_ad_data();
    group.bench_function("full_manufacturer_data", |b| {
        b.iter(|| decode_fields(black_box(&full)).count())
    });

    let truncated: [u8; 6] = [0x02, 0x01, 0x06, 0x1F, 0xFF, 0x4C];
    group.bench_function("truncated", |b| {
        b.iter(|| decode_fields(black_box(&truncated)).count())
    });

    group.finish();
}

fn bench_event_to_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_to_cache");
    group.throughput(Throughput::Elements(1));

    let event = raw_event(&typical_ad_data());
    let mut cache = DeviceCache::new();
    group.bench_function("typical", |b| {
        b.iter(|| {
            let advertisement = Advertisement::parse(black_box(&event)).unwrap();
            let fields: Vec<AdField<'_>> =
                advertisement.fields().filter_map(Result::ok).collect();
            cache
                .record_advertisement(&advertisement, &fields, SystemTime::UNIX_EPOCH)
                .record
                .sighting_count
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode_fields, bench_event_to_cache);
criterion_main!(benches);
