// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Background controllers for map event buffers.
//!
//! A [`ControllerManager`] owns a set of named controllers. Each controller
//! runs a synchronous function on a tokio task, once at start and then every
//! `run_interval`, and accumulates [`ControllerStats`] that stay readable after
//! the controller is removed or the manager is shut down.
//!
//! [`start_event_buffer_gc`] registers the controller that releases expired
//! events of a map using periodic compaction.

pub mod error;
mod gc;
mod manager;

pub use error::Error;
pub use gc::{Compactable, EVENT_BUFFER_GC_PREFIX, event_buffer_gc_name, start_event_buffer_gc};
pub use manager::{BoxError, ControllerFunc, ControllerManager, ControllerParams, ControllerStats};
