// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Criterion benchmarks for ordered ring buffer insertion, valid-range scans
//! and compaction.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mapev_engine::OrderedRingBuffer;

const CAPACITIES: [usize; 3] = [128, 1_024, 16_384];
const INSERTS: u64 = 100_000;

fn filled(capacity: usize, count: u64) -> OrderedRingBuffer<u64> {
    let mut ring = OrderedRingBuffer::new(capacity);
    for n in 0..count {
        ring.add(n);
    }
    ring
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_add");
    _ = group.throughput(Throughput::Elements(INSERTS));
    for capacity in CAPACITIES {
        _ = group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let ring = filled(capacity, INSERTS);
                _ = black_box(ring.len());
            });
        });
    }
    group.finish();
}

fn bench_iterate_valid(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_iterate_valid_half");
    for capacity in CAPACITIES {
        // Wrapped ring whose newer half is valid.
        let ring = filled(capacity, capacity as u64 * 3 / 2);
        let threshold = capacity as u64;
        _ = group.throughput(Throughput::Elements(capacity as u64 / 2));
        _ = group.bench_with_input(BenchmarkId::from_parameter(capacity), &ring, |b, ring| {
            b.iter(|| {
                let mut sum = 0u64;
                ring.iterate_valid(|n| *n >= threshold, |n| sum += *n);
                black_box(sum)
            });
        });
    }
    group.finish();
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_compact_half");
    for capacity in CAPACITIES {
        let threshold = capacity as u64;
        _ = group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter_batched_ref(
                || filled(capacity, capacity as u64 * 3 / 2),
                |ring| black_box(ring.compact(|n| *n >= threshold)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add, bench_iterate_valid, bench_compact);
criterion_main!(benches);
