// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Tests for subscriber fan-out and eviction.
//!
//! # Key Properties Verified
//!
//! - **Fan-out isolation**: a full subscriber is evicted without blocking the
//!   publisher or affecting subscribers that keep up.
//! - **Terminal errors**: eviction surfaces as `Overflow` after the queued
//!   batches; consumer and registry closes surface as `Closed`.
//! - **Close**: idempotent, exactly-once, and safe to race with `publish`.

use super::{HandleStatus, PublishReport, SubscriptionRegistry};
use crate::error::SubscriptionError;
use futures::StreamExt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn registry(capacity: usize) -> SubscriptionRegistry<u64> {
    SubscriptionRegistry::new("test-map".into(), capacity)
}

// =========================================================================
// Fan-out and eviction
// =========================================================================

// A subscriber with capacity K that never drains is evicted on the (K+1)th
// publish, while a subscriber draining alongside it stays open and sees every
// batch.
#[test]
fn slow_subscriber_is_evicted_fast_one_keeps_receiving() {
    const K: usize = 8;
    let registry = registry(K);
    let slow = registry.subscribe();
    let fast = registry.subscribe();

    let mut received = Vec::new();
    for batch in 0..K as u64 {
        let report = registry.publish(batch);
        assert_eq!(report.delivered, 2);
        received.push(fast.try_recv().unwrap().unwrap());
    }
    assert!(slow.is_open());
    assert_eq!(slow.pending(), K);

    let report = registry.publish(K as u64);
    assert_eq!(
        report,
        PublishReport {
            delivered: 1,
            evicted: 1,
            pruned: 0
        }
    );
    received.push(fast.try_recv().unwrap().unwrap());

    assert_eq!(slow.status(), HandleStatus::Evicted);
    assert_eq!(slow.error(), Some(SubscriptionError::Overflow));
    assert_eq!(registry.len(), 1, "evicted handle should leave the active set");
    assert!(fast.is_open());
    assert_eq!(received, (0..=K as u64).collect::<Vec<_>>());

    // Later publishes only reach the fast subscriber.
    let report = registry.publish(100);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.evicted, 0);
    assert_eq!(fast.try_recv().unwrap(), Some(100));
}

// Batches queued before an eviction are still delivered in order, then the
// overflow error, then nothing more.
#[test]
fn evicted_handle_drains_queue_before_overflow() {
    let registry = registry(3);
    let handle = registry.subscribe();
    for batch in 0..4 {
        _ = registry.publish(batch);
    }

    assert_eq!(handle.try_recv().unwrap(), Some(0));
    assert_eq!(handle.try_recv().unwrap(), Some(1));
    assert_eq!(handle.try_recv().unwrap(), Some(2));
    assert_eq!(handle.try_recv(), Err(SubscriptionError::Overflow));
    assert_eq!(handle.try_recv(), Err(SubscriptionError::Overflow));
}

// Publishing with no subscriber is a no-op.
#[test]
fn publish_without_subscribers_reports_nothing() {
    let registry = registry(4);
    assert_eq!(registry.publish(1), PublishReport::default());
    assert!(registry.is_empty());
}

// A slow consumer on its own thread never blocks the publisher: the publisher
// completes every publish and the consumer eventually observes either every
// batch or a prefix followed by an overflow.
#[test]
fn publisher_never_blocks_on_concurrent_slow_consumer() {
    let registry = Arc::new(registry(4));
    let handle = registry.subscribe();

    let consumer = thread::spawn(move || {
        let mut seen = Vec::new();
        loop {
            match handle.recv_blocking() {
                Ok(batch) => {
                    seen.push(batch);
                    thread::sleep(Duration::from_millis(1));
                }
                Err(err) => return (seen, err),
            }
        }
    });

    for batch in 0..1_000 {
        _ = registry.publish(batch);
    }
    _ = registry.close_all();

    let (seen, err) = consumer.join().unwrap();
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 1), "batches should arrive in order");
    assert_eq!(seen.first().copied(), Some(0));
    if seen.len() < 1_000 {
        assert_eq!(err, SubscriptionError::Overflow);
    } else {
        assert_eq!(err, SubscriptionError::Closed);
    }
}

// =========================================================================
// Close semantics
// =========================================================================

// A consumer close is idempotent, is never reported as an overflow, and is
// pruned by the next publish.
#[test]
fn consumer_close_is_not_overflow() {
    let registry = registry(1);
    let handle = registry.subscribe();
    _ = registry.publish(1);

    assert!(handle.close());
    assert!(!handle.close(), "second close should be a no-op");
    assert_eq!(handle.status(), HandleStatus::Closed);
    assert_eq!(handle.error(), Some(SubscriptionError::Closed));
    assert_eq!(handle.try_recv(), Err(SubscriptionError::Closed));

    // The queue is full but the handle is closed: pruned, not evicted.
    let report = registry.publish(2);
    assert_eq!(
        report,
        PublishReport {
            delivered: 0,
            evicted: 0,
            pruned: 1
        }
    );
    assert!(registry.is_empty());
    assert_eq!(handle.status(), HandleStatus::Closed);
}

// Dropping a handle closes it; the registry forgets it on the next publish.
#[test]
fn dropped_handle_is_pruned() {
    let registry = registry(4);
    let keep = registry.subscribe();
    drop(registry.subscribe());
    assert_eq!(registry.len(), 2);

    let report = registry.publish(7);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(keep.try_recv().unwrap(), Some(7));
}

// Stream churn on a map that never publishes must not grow the registry.
#[test]
fn subscribe_prunes_closed_handles_on_idle_map() {
    let registry = registry(4);
    let keep = registry.subscribe();
    for _ in 0..10_000 {
        drop(registry.subscribe());
    }
    assert_eq!(registry.len(), 2, "only the kept and the latest dropped handle remain");

    let closed = registry.subscribe();
    assert!(closed.close());
    let _fresh = registry.subscribe();
    assert_eq!(registry.len(), 2);

    let report = registry.publish(3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.pruned, 0);
    assert_eq!(keep.try_recv().expect("keep should stay open"), Some(3));
}

// Eviction wins over a later close: the handle stays evicted.
#[test]
fn close_after_eviction_keeps_overflow() {
    let registry = registry(1);
    let handle = registry.subscribe();
    _ = registry.publish(1);
    let report = registry.publish(2);
    assert_eq!(report.evicted, 1);

    assert!(!handle.close());
    assert_eq!(handle.status(), HandleStatus::Evicted);
    assert_eq!(handle.error(), Some(SubscriptionError::Overflow));
}

// Racing consumer closes against publishes never double-reports a handle and
// never panics.
#[test]
fn close_races_publish() {
    let registry = Arc::new(registry(2));
    let handles = (0..32).map(|_| registry.subscribe()).collect::<Vec<_>>();

    let publisher = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let mut total = PublishReport::default();
            for batch in 0..64 {
                let report = registry.publish(batch);
                total.evicted += report.evicted;
                total.pruned += report.pruned;
            }
            total
        })
    };
    let closed = handles.iter().filter(|h| h.close()).count();
    let total = publisher.join().unwrap();

    assert_eq!(total.evicted + closed, 32, "each handle ends exactly once");
    for handle in &handles {
        assert_ne!(handle.status(), HandleStatus::Open);
    }
}

// Closing the registry lets consumers drain, then reports `Closed`.
#[tokio::test]
async fn close_all_ends_streams_with_closed() {
    let registry = registry(8);
    let handle = registry.subscribe();
    _ = registry.publish(1);
    _ = registry.publish(2);
    assert_eq!(registry.close_all(), 1);
    assert_eq!(handle.status(), HandleStatus::Closed);

    let items = handle.into_stream().collect::<Vec<_>>().await;
    assert_eq!(items, vec![Ok(1), Ok(2), Err(SubscriptionError::Closed)]);
}

// The async receive path yields queued batches then the overflow error once.
#[tokio::test]
async fn stream_ends_with_single_overflow() {
    let registry = registry(2);
    let handle = registry.subscribe();
    for batch in 0..3 {
        _ = registry.publish(batch);
    }

    let items = handle.into_stream().collect::<Vec<_>>().await;
    assert_eq!(items, vec![Ok(0), Ok(1), Err(SubscriptionError::Overflow)]);
}

#[test]
fn recv_timeout_returns_none_when_idle() {
    let registry = registry(2);
    let handle = registry.subscribe();
    assert_eq!(handle.recv_timeout(Duration::from_millis(5)), Ok(None));
    _ = registry.publish(3);
    assert_eq!(handle.recv_timeout(Duration::from_millis(5)), Ok(Some(3)));
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let registry = registry(0);
    assert_eq!(registry.queue_capacity(), 1);
    let handle = registry.subscribe();
    assert_eq!(handle.capacity(), 1);
    assert_eq!(registry.publish(1).delivered, 1);
}
