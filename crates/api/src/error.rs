// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors returned by the introspection API.

use mapev_config::MapName;

/// Errors returned by [`crate::MapEventsService`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No map is registered under this name.
    #[error("map {map} not found")]
    MapNotFound {
        /// Requested name.
        map: MapName,
    },

    /// The map does not record events.
    #[error("events buffer not enabled for map {map}")]
    EventsNotEnabled {
        /// Name of the map.
        map: MapName,
    },

    /// The map was closed.
    #[error("map {map} is closed")]
    MapClosed {
        /// Name of the map.
        map: MapName,
    },

    /// A map with the same name is already registered.
    #[error("map {map} is already registered")]
    AlreadyRegistered {
        /// Name of the map.
        map: MapName,
    },

    /// The requested name is not a valid map name.
    #[error("invalid map name `{name}`: {details}")]
    InvalidMapName {
        /// Rejected input.
        name: String,
        /// Why it was rejected.
        details: String,
    },

    /// Any other engine failure.
    #[error("{source}")]
    Engine {
        /// Underlying engine error.
        #[source]
        source: mapev_engine::Error,
    },
}

impl From<mapev_engine::Error> for Error {
    fn from(err: mapev_engine::Error) -> Self {
        match err {
            mapev_engine::Error::EventsNotEnabled { map } => Error::EventsNotEnabled { map },
            mapev_engine::Error::MapClosed { map } => Error::MapClosed { map },
            source => Error::Engine { source },
        }
    }
}
