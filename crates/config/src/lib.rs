// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration model for BPF map event buffers.
//!
//! A configuration document declares a set of maps by name. Each map carries
//! the storage bound of its backend and the policy of its events buffer
//! (ring size, time-to-live, compaction mode, subscriber queue capacity).
//!
//! Documents are loaded from YAML or JSON and validated as a whole so that a
//! single run reports every problem at once.

pub mod error;
pub mod map_events;

pub use map_events::{CompactionMode, EventsConfig, MapEventsDocument, MapName, MapSpec};

/// Free-form, human-readable description attached to a declaration.
pub type Description = String;
