// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Introspection API over map event buffers.
//!
//! [`MapEventsService`] looks maps up by name and exposes their events in a
//! serializable form, either as a point-in-time list
//! ([`MapEventsService::get_map_events`]) or as a live stream
//! ([`MapEventsService::stream_map_events`]). A stream always ends with an
//! [`EventStreamItem::Closed`] item telling why it ended.

pub mod error;
mod record;
mod service;
mod source;
mod stream;

pub use error::Error;
pub use mapev_engine::DumpMode;
pub use record::{EventAction, EventState, MapEventList, MapEventRecord};
pub use service::{MapEventsService, StreamOptions};
pub use source::{EventSource, RecordSubscription};
pub use stream::{CloseReason, EventStream, EventStreamItem, StreamCanceller};
