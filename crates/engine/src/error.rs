// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the map events engine.

use mapev_config::MapName;

/// Errors returned by [`crate::map::Map`] operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The map was created without an events buffer.
    #[error("events buffer not enabled for map {map}")]
    EventsNotEnabled {
        /// Name of the map.
        map: MapName,
    },

    /// The map was closed and no longer accepts operations.
    #[error("map {map} is closed")]
    MapClosed {
        /// Name of the map.
        map: MapName,
    },

    /// The backend rejected an update or delete.
    #[error("operation on map {map} failed: {source}")]
    Operation {
        /// Name of the map.
        map: MapName,
        /// Backend failure, also recorded on the matching event.
        #[source]
        source: MapError,
    },
}

/// Outcome of a failed backend operation.
///
/// Recorded on [`crate::events::MapEvent::last_error`] so that readers of the
/// event log can see which mutations did not reach the map.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// The key is not present.
    #[error("key not found")]
    KeyNotFound,

    /// The map holds `max_entries` keys and the key is new.
    #[error("map is full ({max_entries} entries)")]
    MapFull {
        /// Configured bound of the map.
        max_entries: usize,
    },

    /// Any other backend failure.
    #[error("{message}")]
    Backend {
        /// Human-readable failure.
        message: String,
    },
}

/// Terminal error observed by a subscriber.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscriber fell behind and was evicted by the publisher.
    #[error("map event channel buffer was full, closing subscription")]
    Overflow,

    /// The subscription was closed by its consumer or by the map.
    #[error("subscription closed")]
    Closed,
}
