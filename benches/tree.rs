//! Index benchmarks.
//!
//! Measures the three operations that dominate real workloads: point
//! insert, point read, and range scan over the leaf chain.

use burrow::{BPlusTree, DATA_SIZE};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

fn payload(key: i32) -> [u8; DATA_SIZE] {
    let mut buf = [0u8; DATA_SIZE];
    buf[..4].copy_from_slice(&key.to_le_bytes());
    buf
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for count in [1_000i32, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("sequential", count),
            &count,
            |b, &count| {
                b.iter_with_setup(
                    || {
                        let dir = tempdir().unwrap();
                        let tree =
                            BPlusTree::open_with_capacity(dir.path().join("bench.idx"), 64)
                                .unwrap();
                        (dir, tree)
                    },
                    |(_dir, mut tree)| {
                        for key in 0..count {
                            tree.write_data(black_box(key), &payload(key)).unwrap();
                        }
                    },
                );
            },
        );
    }

    group.finish();
}

fn bench_point_read(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut tree = BPlusTree::open_with_capacity(dir.path().join("bench.idx"), 64).unwrap();
    for key in 0..10_000 {
        tree.write_data(key, &payload(key)).unwrap();
    }

    let mut group = c.benchmark_group("point_read");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut key = 0i32;
        b.iter(|| {
            key = (key + 7_919) % 10_000;
            black_box(tree.read_data(black_box(key)).unwrap());
        });
    });
    group.bench_function("miss", |b| {
        b.iter(|| {
            black_box(tree.read_data(black_box(20_000)).unwrap());
        });
    });
    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut tree = BPlusTree::open_with_capacity(dir.path().join("bench.idx"), 64).unwrap();
    for key in 0..10_000 {
        tree.write_data(key, &payload(key)).unwrap();
    }

    let mut group = c.benchmark_group("range_scan");
    for width in [100i32, 1_000] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let results = tree.read_range_data(black_box(1_000), 1_000 + width - 1).unwrap();
                black_box(results.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_point_read, bench_range_scan);
criterion_main!(benches);
