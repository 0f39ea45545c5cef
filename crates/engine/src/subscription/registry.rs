// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Producer side of a subscription: the set of live subscribers.

use super::handle::{Handle, HandleShared};
use arc_swap::ArcSwap;
use mapev_config::MapName;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Subscriber<T> {
    shared: Arc<HandleShared>,
    sender: flume::Sender<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
        }
    }
}

struct RegistryState<T> {
    next_subscriber_id: u64,
    subscribers: HashMap<u64, Subscriber<T>>,
}

/// Outcome of one [`SubscriptionRegistry::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the batch.
    pub delivered: usize,
    /// Subscribers evicted because their queue was full.
    pub evicted: usize,
    /// Subscribers removed because their consumer had closed or dropped them.
    pub pruned: usize,
}

/// Registry of subscribers for one map's events.
pub struct SubscriptionRegistry<T> {
    map: MapName,
    queue_capacity: usize,
    state: Mutex<RegistryState<T>>,
    // Rebuilt under `state` whenever the subscriber set changes.
    snapshot: ArcSwap<Vec<Subscriber<T>>>,
}

impl<T> SubscriptionRegistry<T> {
    /// Creates an empty registry whose subscribers queue at most
    /// `queue_capacity` batches (at least one).
    #[must_use]
    pub fn new(map: MapName, queue_capacity: usize) -> Self {
        Self {
            map,
            queue_capacity: queue_capacity.max(1),
            state: Mutex::new(RegistryState {
                next_subscriber_id: 0,
                subscribers: HashMap::new(),
            }),
            snapshot: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Per-subscriber queue capacity.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of registered subscribers, including ones closed by their
    /// consumer and not yet pruned by a publish or subscribe.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Whether no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a new subscriber, dropping any whose consumer has closed.
    pub fn subscribe(&self) -> Handle<T> {
        let (sender, receiver) = flume::bounded(self.queue_capacity);
        let mut state = self.state.lock();
        let id = state.next_subscriber_id;
        state.next_subscriber_id = state.next_subscriber_id.wrapping_add(1);
        let shared = Arc::new(HandleShared::new(id));
        // Idle maps never publish; forget handles closed since the last change.
        state.subscribers.retain(|_, subscriber| subscriber.shared.is_open());
        let previous = state.subscribers.insert(
            id,
            Subscriber {
                shared: Arc::clone(&shared),
                sender,
            },
        );
        debug_assert!(previous.is_none());
        self.rebuild_snapshot(&state);
        drop(state);

        tracing::debug!(map = %self.map, subscriber = id, capacity = self.queue_capacity, "map events subscriber registered");
        Handle::new(shared, receiver, self.queue_capacity)
    }

    /// Offers `batch` to every open subscriber without blocking.
    ///
    /// A subscriber whose queue is full is evicted and removed. Subscribers
    /// closed by their consumer are removed silently.
    pub fn publish(&self, batch: T) -> PublishReport
    where
        T: Clone,
    {
        let mut report = PublishReport::default();
        let snapshot = self.snapshot.load_full();
        if snapshot.is_empty() {
            return report;
        }

        let mut stale = Vec::new();
        for subscriber in snapshot.iter() {
            let id = subscriber.shared.id();
            if !subscriber.shared.is_open() {
                report.pruned += 1;
                stale.push(id);
                continue;
            }
            match subscriber.sender.try_send(batch.clone()) {
                Ok(()) => report.delivered += 1,
                Err(flume::TrySendError::Full(_)) => {
                    if subscriber.shared.evict() {
                        report.evicted += 1;
                        tracing::warn!(
                            map = %self.map,
                            subscriber = id,
                            capacity = self.queue_capacity,
                            "map event channel buffer was full, closing subscription"
                        );
                    } else {
                        report.pruned += 1;
                    }
                    stale.push(id);
                }
                Err(flume::TrySendError::Disconnected(_)) => {
                    _ = subscriber.shared.close();
                    report.pruned += 1;
                    stale.push(id);
                }
            }
        }
        // The snapshot holds sender clones; release it so removed channels
        // disconnect once the registry drops its own senders.
        drop(snapshot);

        if !stale.is_empty() {
            self.remove(&stale);
        }
        report
    }

    /// Closes and removes every subscriber. Consumers drain what is queued,
    /// then observe [`SubscriptionError::Closed`](crate::SubscriptionError::Closed).
    /// Returns the number of subscribers removed.
    pub fn close_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.subscribers.len();
        // Dropping the senders ends each subscription once its queue drains.
        state.subscribers.clear();
        self.rebuild_snapshot(&state);
        if removed > 0 {
            tracing::debug!(map = %self.map, subscribers = removed, "map events subscribers closed");
        }
        removed
    }

    fn remove(&self, ids: &[u64]) {
        let mut state = self.state.lock();
        for id in ids {
            _ = state.subscribers.remove(id);
        }
        self.rebuild_snapshot(&state);
    }

    fn rebuild_snapshot(&self, state: &RegistryState<T>) {
        let snapshot = state.subscribers.values().cloned().collect::<Vec<_>>();
        self.snapshot.store(Arc::new(snapshot));
    }
}
