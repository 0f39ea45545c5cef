// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Storage behind a [`Map`](crate::map::Map).
//!
//! The map records events around whatever the backend does; the backend only
//! stores entries and reports failures.

use crate::error::MapError;
use std::collections::HashMap;
use std::hash::Hash;

/// Key-value storage driven by a [`Map`](crate::map::Map).
///
/// Calls are serialized by the map's lock: `&mut self` methods run under the
/// write lock, `&self` methods under the read lock.
pub trait MapBackend<K, V>: Send + Sync {
    /// Returns the value stored for `key`.
    fn lookup(&self, key: &K) -> Option<V>;

    /// Inserts or overwrites `key`.
    fn update(&mut self, key: K, value: V) -> Result<(), MapError>;

    /// Removes `key`.
    fn delete(&mut self, key: &K) -> Result<(), MapError>;

    /// Every stored key, in unspecified order.
    fn keys(&self) -> Vec<K>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether no entry is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash map bounded to `max_entries` keys.
///
/// A new key beyond the bound is rejected with [`MapError::MapFull`]; deleting
/// an absent key fails with [`MapError::KeyNotFound`].
#[derive(Debug, Clone)]
pub struct InMemoryBackend<K, V> {
    entries: HashMap<K, V>,
    max_entries: usize,
}

impl<K, V> InMemoryBackend<K, V> {
    /// Creates an empty backend holding at most `max_entries` keys.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    /// Configured bound.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl<K, V> MapBackend<K, V> for InMemoryBackend<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn lookup(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn update(&mut self, key: K, value: V) -> Result<(), MapError> {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            return Err(MapError::MapFull {
                max_entries: self.max_entries,
            });
        }
        _ = self.entries.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &K) -> Result<(), MapError> {
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or(MapError::KeyNotFound)
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
