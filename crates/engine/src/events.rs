// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Time-bounded log of map mutation events.
//!
//! An [`EventsBuffer`] stores the most recent events of one map in an
//! [`OrderedRingBuffer`](crate::ring_buffer::OrderedRingBuffer) and hands every
//! newly added batch to its subscribers. With a TTL configured, an event stops
//! being visible to dumps once it is older than the TTL, and its slot is
//! released by the next compaction: on every add for
//! [`CompactionMode::Inline`](mapev_config::CompactionMode::Inline), or by a
//! periodic controller for
//! [`CompactionMode::Periodic`](mapev_config::CompactionMode::Periodic).
//!
//! Buffers are not synchronized on their own. The owning map serializes
//! mutation (`&mut self`) against dump and subscribe (`&self`) with its lock,
//! which is also what makes dump-then-subscribe atomic.

mod buffer;
mod event;

pub use buffer::{EventCallback, EventsBuffer};
pub use event::{Action, DesiredAction, MapEvent};

use std::sync::Arc;

/// One published unit: the events recorded by a single map operation.
pub type EventBatch<K, V> = Arc<[Arc<MapEvent<K, V>>]>;

/// Which buffered events a dump replays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DumpMode {
    /// Only events within the TTL.
    #[default]
    Valid,
    /// Every buffered event, including expired ones not yet compacted.
    All,
}
