//! Encode/decode throughput for the group-of-7-bits varint scheme across
//! the small, medium, and large magnitude ranges that trace entries and
//! chunk-length prefixes actually exercise.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vex_core::wire::varint;

fn sample_values() -> Vec<(&'static str, Vec<u64>)> {
    vec![
        ("single_byte", (0u64..100).collect()),
        ("two_byte", (0u64..100).map(|i| 1000 + i * 37).collect()),
        ("large", (0u64..100).map(|i| u64::MAX / (i + 1)).collect()),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_encode");
    for (name, values) in sample_values() {
        group.bench_with_input(BenchmarkId::new("encode", name), &values, |b, values| {
            b.iter(|| {
                let mut buf = Vec::new();
                for &v in values {
                    varint::encode(black_box(v), &mut buf);
                }
                black_box(buf);
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_decode");
    for (name, values) in sample_values() {
        let mut encoded = Vec::new();
        for &v in &values {
            varint::encode(v, &mut encoded);
        }
        group.bench_with_input(BenchmarkId::new("decode_lax", name), &encoded, |b, encoded| {
            b.iter(|| {
                let mut pos = 0;
                while pos < encoded.len() {
                    let (v, n) = varint::decode_lax(&encoded[pos..]).unwrap();
                    black_box(v);
                    pos += n;
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("decode_strict", name), &encoded, |b, encoded| {
            b.iter(|| {
                let mut pos = 0;
                while pos < encoded.len() {
                    let (v, n) = varint::decode_strict(&encoded[pos..]).unwrap();
                    black_box(v);
                    pos += n;
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
