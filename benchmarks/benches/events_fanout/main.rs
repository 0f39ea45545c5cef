// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Criterion benchmarks for recording map updates with live subscribers.

#![allow(missing_docs)]

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mapev_config::EventsConfig;
use mapev_engine::Map;

const UPDATES: u64 = 10_000;
const SUBSCRIBER_COUNTS: [usize; 4] = [0, 1, 4, 16];
const QUEUE_CAPACITY: usize = 16_384;

fn new_map() -> Map<u32, u64> {
    Map::in_memory(
        "bench".into(),
        4_096,
        &EventsConfig::enabled(1_024, Duration::ZERO).with_subscriber_queue_capacity(QUEUE_CAPACITY),
    )
}

// Every subscriber drains on its own thread until the map closes.
fn run_case(num_subs: usize) {
    let map = new_map();
    let consumers = (0..num_subs)
        .filter_map(|_| map.dump_and_subscribe(None, true))
        .map(|handle| {
            thread::spawn(move || {
                let mut count = 0u64;
                while let Ok(batch) = handle.recv_blocking() {
                    count += batch.len() as u64;
                }
                count
            })
        })
        .collect::<Vec<_>>();

    for n in 0..UPDATES {
        map.update((n % 4_096) as u32, n).expect("update should succeed");
    }
    _ = map.close();

    let mut total = 0u64;
    for consumer in consumers {
        total += consumer.join().expect("consumer thread should not panic");
    }
    assert_eq!(total, UPDATES * num_subs as u64);
}

fn bench_update_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_update_fanout");
    _ = group.throughput(Throughput::Elements(UPDATES));
    _ = group.sample_size(20);
    for num_subs in SUBSCRIBER_COUNTS {
        _ = group.bench_with_input(BenchmarkId::from_parameter(num_subs), &num_subs, |b, &num_subs| {
            b.iter(|| run_case(black_box(num_subs)));
        });
    }
    group.finish();
}

// Slow subscribers are evicted instead of slowing the producer down.
fn bench_update_with_stalled_subscriber(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_update_stalled_subscriber");
    _ = group.throughput(Throughput::Elements(UPDATES));
    _ = group.bench_function("evicted", |b| {
        b.iter(|| {
            let map = Map::<u32, u64>::in_memory(
                "stalled".into(),
                4_096,
                &EventsConfig::enabled(1_024, Duration::ZERO).with_subscriber_queue_capacity(64),
            );
            let stalled = map.dump_and_subscribe(None, true);
            for n in 0..UPDATES {
                map.update((n % 4_096) as u32, n).expect("update should succeed");
            }
            black_box(stalled.map(|handle| handle.status()))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_update_fanout, bench_update_with_stalled_subscriber);
criterion_main!(benches);
