// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Type-erased access to a map's events.

use crate::record::MapEventRecord;
use futures::StreamExt;
use futures::stream::BoxStream;
use mapev_config::MapName;
use mapev_engine::{DumpMode, Error, EventCallback, Map, MapEvent, SubscriptionError};
use std::fmt::Display;
use std::sync::Arc;

/// Snapshot and live feed of a map's events, rendered as records.
pub struct RecordSubscription {
    /// Valid events at subscription time, oldest first. Empty unless a dump
    /// was requested.
    pub snapshot: Vec<MapEventRecord>,
    /// Events recorded after the snapshot, one item per map operation,
    /// ending with the terminal subscription error.
    pub live: BoxStream<'static, Result<Vec<MapEventRecord>, SubscriptionError>>,
}

/// A map whose events can be listed and streamed without knowing its key
/// and value types.
pub trait EventSource: Send + Sync + 'static {
    /// Name of the map.
    fn map_name(&self) -> &MapName;

    /// Events selected by `mode`, oldest first.
    fn list_records(&self, mode: DumpMode) -> Result<Vec<MapEventRecord>, Error>;

    /// Subscribes to later events, optionally with a snapshot of the current
    /// ones taken atomically with the subscription.
    fn subscribe_records(&self, dump: bool) -> Result<RecordSubscription, Error>;
}

impl<K, V> EventSource for Map<K, V>
where
    K: Display + Clone + Send + Sync + 'static,
    V: Display + Clone + Send + Sync + 'static,
{
    fn map_name(&self) -> &MapName {
        self.name()
    }

    fn list_records(&self, mode: DumpMode) -> Result<Vec<MapEventRecord>, Error> {
        Ok(self
            .list_events(mode)?
            .iter()
            .map(|event| MapEventRecord::from_event(event.as_ref()))
            .collect())
    }

    fn subscribe_records(&self, dump: bool) -> Result<RecordSubscription, Error> {
        let mut snapshot = Vec::new();
        let handle = {
            let mut collect =
                |event: &Arc<MapEvent<K, V>>| snapshot.push(MapEventRecord::from_event(event.as_ref()));
            let callback: Option<&mut EventCallback<'_, K, V>> = if dump { Some(&mut collect) } else { None };
            self.dump_and_subscribe(callback, true)
        };
        let Some(handle) = handle else {
            return Err(if self.is_closed() {
                Error::MapClosed {
                    map: self.name().clone(),
                }
            } else {
                Error::EventsNotEnabled {
                    map: self.name().clone(),
                }
            });
        };

        let live = handle
            .into_stream()
            .map(|item| {
                item.map(|batch| {
                    batch
                        .iter()
                        .map(|event| MapEventRecord::from_event(event.as_ref()))
                        .collect::<Vec<_>>()
                })
            })
            .boxed();
        Ok(RecordSubscription { snapshot, live })
    }
}
