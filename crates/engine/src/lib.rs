// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Bounded, time-ordered audit log of map mutations with live fan-out.
//!
//! - [`ring_buffer::OrderedRingBuffer`]: fixed-capacity, insertion-ordered
//!   storage with in-place compaction of the oldest entries.
//! - [`events::EventsBuffer`]: TTL-aware event log built on the ring,
//!   publishing every insert to its subscribers.
//! - [`subscription`]: non-blocking fan-out. A subscriber whose queue is full
//!   is evicted instead of slowing down the producer.
//! - [`map::Map`]: key-value map that records every update and delete, and
//!   exposes dump and dump-then-subscribe under a single lock.

pub mod error;
pub mod events;
pub mod map;
pub mod ring_buffer;
pub mod subscription;

pub use error::{Error, MapError, SubscriptionError};
pub use events::{Action, DesiredAction, DumpMode, EventBatch, EventCallback, EventsBuffer, MapEvent};
pub use map::{InMemoryBackend, Map, MapBackend};
pub use ring_buffer::OrderedRingBuffer;
pub use subscription::{Handle, HandleStatus, PublishReport, SubscriptionRegistry};
