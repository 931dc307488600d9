//! Criterion benchmarks for status block decoding.
//!
//! Status polling runs at several hertz per client, so decode cost bounds
//! how many monitoring loops one host can sustain.
//!
//! Run with: cargo bench --bench status_decode

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use daq_driver_hubner::{StatusSnapshot, STATUS_BLOCK_LEN};

fn sample() -> StatusSnapshot {
    let mut status = StatusSnapshot {
        abi_version: 1,
        target_wavelength: 1550.0,
        measured_wavelength: 1550.002,
        ..Default::default()
    };
    status.status_bits.lock_opo = true;
    status.piezo_etalon.output = 42.0;
    status.tec_opo.temperature = 41.7;
    status.stepper_shg.target_period = -2;
    status
}

fn status_decode(c: &mut Criterion) {
    let status = sample();
    let bytes = status.encode();
    let text = status.to_base64();

    let mut group = c.benchmark_group("status_decode");
    group.throughput(Throughput::Bytes(STATUS_BLOCK_LEN as u64));
    group.bench_function("from_bytes", |b| {
        b.iter(|| StatusSnapshot::from_bytes(black_box(&bytes)))
    });
    group.bench_function("from_base64", |b| {
        b.iter(|| StatusSnapshot::from_base64(black_box(&text)))
    });
    group.finish();
}

criterion_group!(benches, status_decode);
criterion_main!(benches);
