// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Key-value map that records its own mutations.
//!
//! A [`Map`] wraps a [`MapBackend`] and, when events are enabled, an
//! [`EventsBuffer`]. Every update and delete, successful or not, is recorded
//! while the write lock is still held, so the buffer order is the mutation
//! order. Dumps and subscriptions take the read lock; a
//! [`Map::dump_and_subscribe`] call holds it across both steps.
//!
//! Handles are cheap clones sharing one map.

mod backend;

pub use backend::{InMemoryBackend, MapBackend};

use crate::error::{Error, MapError};
use crate::events::{DumpMode, EventBatch, EventCallback, EventsBuffer, MapEvent};
use crate::subscription::Handle;
use mapev_config::{EventsConfig, MapName, MapSpec};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::time::Instant;

struct MapState<K, V> {
    backend: Box<dyn MapBackend<K, V>>,
    events: Option<EventsBuffer<K, V>>,
    closed: bool,
}

struct MapInner<K, V> {
    name: MapName,
    events_config: Option<EventsConfig>,
    state: RwLock<MapState<K, V>>,
}

/// A named map whose mutations feed an optional event log.
pub struct Map<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> Clone for Map<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Map<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Creates a map over `backend`. Events are recorded only when
    /// `events.enabled` is set.
    pub fn new(name: MapName, backend: impl MapBackend<K, V> + 'static, events: &EventsConfig) -> Self {
        let (events_config, buffer) = if events.enabled {
            (
                Some(events.clone()),
                Some(EventsBuffer::new(name.clone(), events)),
            )
        } else {
            (None, None)
        };
        tracing::debug!(
            map = %name,
            events = buffer.is_some(),
            max_size = events.max_size,
            ttl_ms = events.ttl_ms,
            "map created"
        );
        Self {
            inner: Arc::new(MapInner {
                name,
                events_config,
                state: RwLock::new(MapState {
                    backend: Box::new(backend),
                    events: buffer,
                    closed: false,
                }),
            }),
        }
    }

    /// Name of the map.
    #[must_use]
    pub fn name(&self) -> &MapName {
        &self.inner.name
    }

    /// Events policy, `None` when events are disabled.
    #[must_use]
    pub fn events_config(&self) -> Option<&EventsConfig> {
        self.inner.events_config.as_ref()
    }

    /// Whether mutations are recorded.
    #[must_use]
    pub fn events_enabled(&self) -> bool {
        self.inner.events_config.is_some()
    }

    /// Whether [`Map::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.read()?.backend.len())
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.read()?.backend.is_empty())
    }

    /// Returns the value stored for `key`.
    pub fn lookup(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.read()?.backend.lookup(key))
    }

    /// Inserts or overwrites `key` and records the outcome.
    pub fn update(&self, key: K, value: V) -> Result<(), Error> {
        let mut state = self.write()?;
        let outcome = state.backend.update(key.clone(), value.clone());
        if let Some(events) = state.events.as_mut() {
            _ = events.add(MapEvent::update(key, value, outcome.clone()));
        }
        drop(state);
        self.operation_result(outcome)
    }

    /// Removes `key` and records the outcome.
    pub fn delete(&self, key: &K) -> Result<(), Error> {
        let mut state = self.write()?;
        let outcome = state.backend.delete(key);
        if let Some(events) = state.events.as_mut() {
            _ = events.add(MapEvent::delete(key.clone(), outcome.clone()));
        }
        drop(state);
        self.operation_result(outcome)
    }

    /// Removes every key. All deletes are recorded as one batch. Keys that
    /// fail to delete stay in the map; the first failure is returned.
    pub fn delete_all(&self) -> Result<(), Error> {
        let mut state = self.write()?;
        let keys = state.backend.keys();
        let mut first_error = None;
        let mut batch = Vec::with_capacity(if state.events.is_some() { keys.len() } else { 0 });
        for key in keys {
            let outcome = state.backend.delete(&key);
            if let Err(err) = &outcome {
                _ = first_error.get_or_insert_with(|| err.clone());
            }
            if state.events.is_some() {
                batch.push(MapEvent::delete(key, outcome));
            }
        }
        if let Some(events) = state.events.as_mut() {
            _ = events.add_batched(batch);
        }
        drop(state);
        first_error.map_or(Ok(()), |err| self.operation_result(Err(err)))
    }

    /// Replays the valid events through `callback`, then, when `follow` is
    /// set, subscribes to later events. No event is missed or repeated
    /// between the two.
    ///
    /// Returns `None` when `follow` is unset, events are disabled or the map
    /// is closed.
    pub fn dump_and_subscribe(
        &self,
        callback: Option<&mut EventCallback<'_, K, V>>,
        follow: bool,
    ) -> Option<Handle<EventBatch<K, V>>> {
        let state = self.inner.state.read();
        if state.closed {
            return None;
        }
        state.events.as_ref()?.dump_and_subscribe(callback, follow)
    }

    /// Replays the valid events, oldest first.
    pub fn dump_events_with_callback(&self, callback: &mut EventCallback<'_, K, V>) -> Result<(), Error> {
        let state = self.read()?;
        let events = self.events_of(&state)?;
        events.dump_with_callback(callback);
        Ok(())
    }

    /// Collects the events selected by `mode`, oldest first.
    pub fn list_events(&self, mode: DumpMode) -> Result<Vec<Arc<MapEvent<K, V>>>, Error> {
        let state = self.read()?;
        let events = self.events_of(&state)?;
        let mut out = Vec::with_capacity(events.len());
        events.dump(mode, &mut |event: &Arc<MapEvent<K, V>>| out.push(Arc::clone(event)));
        Ok(out)
    }

    /// Releases expired events. Returns how many were released; 0 when events
    /// are disabled or the map is closed.
    pub fn compact_events(&self) -> usize {
        let mut state = self.inner.state.write();
        match state.events.as_mut() {
            Some(events) => events.compact_expired(Instant::now()),
            None => 0,
        }
    }

    /// Drops the event log and ends every subscription. Later operations fail
    /// with [`Error::MapClosed`]. Returns `false` if the map was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.inner.state.write();
        if state.closed {
            return false;
        }
        state.closed = true;
        let subscribers = state
            .events
            .take()
            .map_or(0, |events| events.close_subscribers());
        tracing::debug!(map = %self.inner.name, subscribers, "map closed");
        true
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MapState<K, V>>, Error> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(Error::MapClosed {
                map: self.inner.name.clone(),
            });
        }
        Ok(state)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MapState<K, V>>, Error> {
        let state = self.inner.state.write();
        if state.closed {
            return Err(Error::MapClosed {
                map: self.inner.name.clone(),
            });
        }
        Ok(state)
    }

    fn events_of<'a>(&self, state: &'a MapState<K, V>) -> Result<&'a EventsBuffer<K, V>, Error> {
        state.events.as_ref().ok_or_else(|| Error::EventsNotEnabled {
            map: self.inner.name.clone(),
        })
    }

    fn operation_result(&self, outcome: Result<(), MapError>) -> Result<(), Error> {
        outcome.map_err(|source| {
            tracing::debug!(map = %self.inner.name, error = %source, "map operation failed");
            Error::Operation {
                map: self.inner.name.clone(),
                source,
            }
        })
    }
}

impl<K, V> Map<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a map over an [`InMemoryBackend`] bounded to `max_entries`.
    pub fn in_memory(name: MapName, max_entries: usize, events: &EventsConfig) -> Self {
        Self::new(name, InMemoryBackend::new(max_entries), events)
    }

    /// Creates an in-memory map from its declaration.
    pub fn from_spec(name: MapName, spec: &MapSpec) -> Self {
        Self::in_memory(name, spec.max_entries, &spec.events)
    }
}

impl<K, V> fmt::Debug for Map<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Map")
            .field("name", &self.inner.name)
            .field("entries", &state.backend.len())
            .field("events", &state.events)
            .field("closed", &state.closed)
            .finish()
    }
}
