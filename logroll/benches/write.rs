//! Microbenchmarks for the `write()` hot path.
//!
//! Measures append latency with and without rotation and archiving.
//!
//! Run with: `cargo bench -p logroll -- write`

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logroll::{CompressionMode, LogSink, SinkConfig};
use tempfile::tempdir;

const RECORD: &[u8] = b"2024-01-01T00:00:00.000Z INFO request handled path=/api/v1/items status=200\n";

fn bench_write_no_rotation(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let sink = LogSink::open(SinkConfig::new(temp_dir.path().join("app.log"), u64::MAX)).unwrap();

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Bytes(RECORD.len() as u64));
    group.bench_function("append", |b| {
        b.iter(|| sink.write(black_box(RECORD)).unwrap());
    });
    group.finish();
}

fn bench_write_with_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("write/rotating");
    group.throughput(Throughput::Bytes(RECORD.len() as u64));

    for mode in [
        CompressionMode::Disabled,
        CompressionMode::Inline,
        CompressionMode::Background,
    ] {
        let temp_dir = tempdir().unwrap();
        let config = SinkConfig::new(temp_dir.path().join("app.log"), 64 * 1024)
            .with_max_backups(4)
            .with_compression(mode);
        let sink = LogSink::open(config).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &mode, |b, _| {
            b.iter(|| sink.write(black_box(RECORD)).unwrap());
        });

        sink.close().unwrap();
    }

    group.finish();
}

fn bench_contended_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write/contended");

    for threads in [2usize, 4, 8] {
        let temp_dir = tempdir().unwrap();
        let sink = Arc::new(
            LogSink::open(
                SinkConfig::new(temp_dir.path().join("app.log"), 1024 * 1024).with_max_backups(2),
            )
            .unwrap(),
        );

        group.throughput(Throughput::Bytes((RECORD.len() * threads * 100) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let sink = Arc::clone(&sink);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                sink.write(RECORD).unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_write_no_rotation,
    bench_write_with_rotation,
    bench_contended_write
);
criterion_main!(benches);
