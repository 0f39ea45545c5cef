// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use super::{DumpMode, EventBatch, MapEvent};
use crate::ring_buffer::OrderedRingBuffer;
use crate::subscription::{Handle, PublishReport, SubscriptionRegistry};
use mapev_config::{CompactionMode, EventsConfig, MapName};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Visitor invoked once per replayed event.
pub type EventCallback<'a, K, V> = dyn FnMut(&Arc<MapEvent<K, V>>) + 'a;

/// Event log of one map.
pub struct EventsBuffer<K, V> {
    map: MapName,
    ring: OrderedRingBuffer<Arc<MapEvent<K, V>>>,
    ttl: Option<Duration>,
    compaction: CompactionMode,
    subscribers: SubscriptionRegistry<EventBatch<K, V>>,
    last_recorded: Option<Instant>,
}

impl<K, V> EventsBuffer<K, V> {
    /// Creates an empty buffer sized and timed by `config`.
    ///
    /// The `enabled` flag is the caller's concern: a map without events simply
    /// has no buffer.
    #[must_use]
    pub fn new(map: MapName, config: &EventsConfig) -> Self {
        let subscribers = SubscriptionRegistry::new(map.clone(), config.subscriber_queue_capacity);
        Self {
            map,
            ring: OrderedRingBuffer::new(config.max_size),
            ttl: config.ttl(),
            compaction: config.compaction,
            subscribers,
            last_recorded: None,
        }
    }

    /// Name of the map the events belong to.
    #[must_use]
    pub fn map_name(&self) -> &MapName {
        &self.map
    }

    /// Maximum number of buffered events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of buffered events, expired ones included until compacted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether no event is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Time-to-live of events, `None` when they never expire.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// When expired events are released.
    #[must_use]
    pub fn compaction(&self) -> CompactionMode {
        self.compaction
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Records one event and publishes it as a single-event batch.
    pub fn add(&mut self, event: MapEvent<K, V>) -> PublishReport {
        self.add_batched(vec![event])
    }

    /// Records `events` in order and publishes them as one batch.
    pub fn add_batched(&mut self, events: Vec<MapEvent<K, V>>) -> PublishReport {
        if events.is_empty() {
            return PublishReport::default();
        }
        if self.compaction == CompactionMode::Inline {
            _ = self.compact_expired(Instant::now());
        }

        let batch: EventBatch<K, V> = events
            .into_iter()
            .map(|mut event| {
                if let Some(last) = self.last_recorded {
                    event.recorded_at = event.recorded_at.max(last);
                }
                self.last_recorded = Some(event.recorded_at);
                let event = Arc::new(event);
                self.ring.add(Arc::clone(&event));
                event
            })
            .collect();

        self.subscribers.publish(batch)
    }

    /// Releases the slots of events expired at `now`. Returns how many were
    /// released; always 0 without a TTL.
    pub fn compact_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let removed = self.ring.compact(|event| is_valid(ttl, now, event));
        if removed > 0 {
            tracing::trace!(map = %self.map, removed, remaining = self.ring.len(), "compacted map events");
        }
        removed
    }

    /// Replays the events still within the TTL, oldest first.
    pub fn dump_with_callback(&self, callback: &mut EventCallback<'_, K, V>) {
        self.dump(DumpMode::Valid, callback);
    }

    /// Replays every buffered event, oldest first.
    pub fn dump_all(&self, callback: &mut EventCallback<'_, K, V>) {
        self.dump(DumpMode::All, callback);
    }

    /// Replays the events selected by `mode`, oldest first.
    pub fn dump(&self, mode: DumpMode, callback: &mut EventCallback<'_, K, V>) {
        match (mode, self.ttl) {
            (DumpMode::Valid, Some(ttl)) => {
                let now = Instant::now();
                self.ring
                    .iterate_valid(|event| is_valid(ttl, now, event), |event| callback(event));
            }
            _ => self.ring.iter().for_each(|event| callback(event)),
        }
    }

    /// Replays the valid events through `callback` and, when `follow` is set,
    /// subscribes to everything added afterwards.
    ///
    /// Both steps run against the same `&self` borrow, so under the owner's
    /// lock no event can fall between the dump and the subscription, and none
    /// is seen twice.
    pub fn dump_and_subscribe(
        &self,
        callback: Option<&mut EventCallback<'_, K, V>>,
        follow: bool,
    ) -> Option<Handle<EventBatch<K, V>>> {
        if let Some(callback) = callback {
            self.dump_with_callback(callback);
        }
        follow.then(|| self.subscribers.subscribe())
    }

    /// Ends every subscription. Returns the number of subscriptions closed.
    pub fn close_subscribers(&self) -> usize {
        self.subscribers.close_all()
    }
}

impl<K, V> fmt::Debug for EventsBuffer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsBuffer")
            .field("map", &self.map)
            .field("len", &self.ring.len())
            .field("capacity", &self.ring.capacity())
            .field("ttl", &self.ttl)
            .field("compaction", &self.compaction)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// Ages are monotonic in buffer order, so validity is a suffix of the ring.
fn is_valid<K, V>(ttl: Duration, now: Instant, event: &MapEvent<K, V>) -> bool {
    now.saturating_duration_since(event.recorded_at) < ttl
}
