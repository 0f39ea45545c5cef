// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Registry of maps exposed through the introspection API.

use crate::error::Error;
use crate::record::MapEventList;
use crate::source::EventSource;
use crate::stream::EventStream;
use mapev_config::MapName;
use mapev_engine::DumpMode;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Options of [`MapEventsService::stream_map_events`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Start the stream with the currently valid events.
    pub dump: bool,
}

/// Maps exposed by name. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct MapEventsService {
    sources: Arc<RwLock<HashMap<MapName, Arc<dyn EventSource>>>>,
}

impl MapEventsService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposes `source` under its map name.
    pub fn register(&self, source: Arc<dyn EventSource>) -> Result<(), Error> {
        let map = source.map_name().clone();
        let mut sources = self.sources.write();
        if sources.contains_key(&map) {
            return Err(Error::AlreadyRegistered { map });
        }
        tracing::debug!(map = %map, "map registered for introspection");
        _ = sources.insert(map, source);
        Ok(())
    }

    /// Stops exposing the map `name`. Open streams are unaffected.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn EventSource>> {
        self.sources.write().remove(name)
    }

    /// Names of the exposed maps, sorted.
    #[must_use]
    pub fn map_names(&self) -> Vec<MapName> {
        let mut names = self.sources.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Lists the events of the map `name`.
    pub fn get_map_events(&self, name: &str, mode: DumpMode) -> Result<MapEventList, Error> {
        let source = self.source(name)?;
        let events = source.list_records(mode)?;
        Ok(MapEventList {
            map: source.map_name().clone(),
            events,
        })
    }

    /// Streams the events of the map `name` as they are recorded.
    pub fn stream_map_events(&self, name: &str, options: StreamOptions) -> Result<EventStream, Error> {
        let source = self.source(name)?;
        let subscription = source.subscribe_records(options.dump)?;
        tracing::debug!(map = %source.map_name(), dump = options.dump, "map events stream opened");
        Ok(EventStream::new(
            source.map_name().clone(),
            subscription,
            options.dump,
        ))
    }

    fn source(&self, name: &str) -> Result<Arc<dyn EventSource>, Error> {
        let map = MapName::parse(name).map_err(|details| Error::InvalidMapName {
            name: name.to_owned(),
            details,
        })?;
        self.sources
            .read()
            .get(&map)
            .cloned()
            .ok_or(Error::MapNotFound { map })
    }
}

impl std::fmt::Debug for MapEventsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEventsService")
            .field("maps", &self.map_names())
            .finish()
    }
}
