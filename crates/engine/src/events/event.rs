// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use crate::error::MapError;
use std::fmt;
use std::time::SystemTime;
use tokio::time::Instant;

/// Kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Insert or overwrite of a key.
    Update,
    /// Removal of a key.
    Delete,
}

impl Action {
    /// Lower-case label used in listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation state of the key after the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DesiredAction {
    /// The map reflects the operation.
    #[default]
    Ok,
    /// The update failed; the key still has to be inserted.
    Insert,
    /// The delete failed; the key still has to be removed.
    Delete,
}

impl DesiredAction {
    /// Label used in listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DesiredAction::Ok => "sync",
            DesiredAction::Insert => "to-be-inserted",
            DesiredAction::Delete => "to-be-deleted",
        }
    }
}

impl fmt::Display for DesiredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed mutation of a map.
///
/// Buffered events are shared behind `Arc` and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent<K, V> {
    /// Wall-clock time of the operation, for display.
    pub timestamp: SystemTime,
    /// Monotonic time of the operation, for TTL checks. Non-decreasing in
    /// buffer order.
    pub recorded_at: Instant,
    /// Kind of mutation.
    pub action: Action,
    /// Key the operation targeted.
    pub key: K,
    /// New value for updates, `None` for deletes.
    pub value: Option<V>,
    /// State of the key after the operation.
    pub desired_action: DesiredAction,
    /// Backend failure, if the operation did not apply.
    pub last_error: Option<MapError>,
}

impl<K, V> MapEvent<K, V> {
    /// Event for an update of `key` to `value` that produced `outcome`.
    pub fn update(key: K, value: V, outcome: Result<(), MapError>) -> Self {
        Self::new(Action::Update, key, Some(value), outcome)
    }

    /// Event for a delete of `key` that produced `outcome`.
    pub fn delete(key: K, outcome: Result<(), MapError>) -> Self {
        Self::new(Action::Delete, key, None, outcome)
    }

    fn new(action: Action, key: K, value: Option<V>, outcome: Result<(), MapError>) -> Self {
        let (desired_action, last_error) = match outcome {
            Ok(()) => (DesiredAction::Ok, None),
            Err(err) => {
                let desired = match action {
                    Action::Update => DesiredAction::Insert,
                    Action::Delete => DesiredAction::Delete,
                };
                (desired, Some(err))
            }
        };
        Self {
            timestamp: SystemTime::now(),
            recorded_at: Instant::now(),
            action,
            key,
            value,
            desired_action,
            last_error,
        }
    }

    /// Overrides both clocks, for replay and tests.
    #[must_use]
    pub fn at(mut self, timestamp: SystemTime, recorded_at: Instant) -> Self {
        self.timestamp = timestamp;
        self.recorded_at = recorded_at;
        self
    }

    /// Whether the operation reached the map.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.last_error.is_none()
    }
}
