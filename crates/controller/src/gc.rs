// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Periodic compaction of map event buffers.

use crate::error::Error;
use crate::manager::{ControllerManager, ControllerParams};
use mapev_config::{CompactionMode, MapName};
use mapev_engine::Map;
use std::time::Duration;

/// Prefix of the controller names registered by [`start_event_buffer_gc`].
pub const EVENT_BUFFER_GC_PREFIX: &str = "bpf-event-buffer-gc-";

/// A map whose event buffer can be compacted from a background controller.
pub trait Compactable: Send + Sync + 'static {
    /// Name of the map.
    fn map_name(&self) -> &MapName;

    /// Interval at which a background controller should compact, `None` when
    /// the map needs no background compaction.
    fn gc_interval(&self) -> Option<Duration>;

    /// Releases expired events. Returns how many were released.
    fn compact(&self) -> usize;
}

impl<K, V> Compactable for Map<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn map_name(&self) -> &MapName {
        self.name()
    }

    fn gc_interval(&self) -> Option<Duration> {
        let config = self.events_config()?;
        match config.compaction {
            CompactionMode::Periodic => config.ttl(),
            CompactionMode::Inline => None,
        }
    }

    fn compact(&self) -> usize {
        self.compact_events()
    }
}

/// Name of the garbage-collection controller of `map`.
#[must_use]
pub fn event_buffer_gc_name(map: &MapName) -> String {
    format!("{EVENT_BUFFER_GC_PREFIX}{map}")
}

/// Registers a controller compacting `map` every TTL.
///
/// Returns `Ok(false)` without registering anything when the map has events
/// disabled, no TTL, or inline compaction.
pub fn start_event_buffer_gc<M>(manager: &ControllerManager, map: &M) -> Result<bool, Error>
where
    M: Compactable + Clone,
{
    let Some(interval) = map.gc_interval() else {
        tracing::debug!(map = %map.map_name(), "no periodic compaction needed");
        return Ok(false);
    };
    let target = map.clone();
    manager.update_controller(
        event_buffer_gc_name(map.map_name()),
        ControllerParams::new(interval, move || Ok(target.compact())),
    )?;
    Ok(true)
}
