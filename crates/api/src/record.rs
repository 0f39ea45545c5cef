// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Serializable view of map events.

use chrono::{DateTime, Utc};
use mapev_config::MapName;
use mapev_engine::{Action, DesiredAction, MapEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation, as exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Insert or overwrite.
    Update,
    /// Removal.
    Delete,
}

impl From<Action> for EventAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Update => EventAction::Update,
            Action::Delete => EventAction::Delete,
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            EventAction::Update => Action::Update,
            EventAction::Delete => Action::Delete,
        };
        action.fmt(f)
    }
}

/// Reconciliation state of the key after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventState {
    /// The map reflects the operation.
    Sync,
    /// A failed update still has to be applied.
    ToBeInserted,
    /// A failed delete still has to be applied.
    ToBeDeleted,
}

impl From<DesiredAction> for EventState {
    fn from(desired: DesiredAction) -> Self {
        match desired {
            DesiredAction::Ok => EventState::Sync,
            DesiredAction::Insert => EventState::ToBeInserted,
            DesiredAction::Delete => EventState::ToBeDeleted,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desired = match self {
            EventState::Sync => DesiredAction::Ok,
            EventState::ToBeInserted => DesiredAction::Insert,
            EventState::ToBeDeleted => DesiredAction::Delete,
        };
        desired.fmt(f)
    }
}

/// One map event with key and value rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEventRecord {
    /// Wall-clock time of the operation (RFC 3339 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Kind of mutation.
    pub action: EventAction,
    /// Rendered key.
    pub key: String,
    /// Rendered value, absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// State of the key after the operation.
    pub state: EventState,
    /// Backend failure, if the operation did not apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MapEventRecord {
    /// Renders `event` with the `Display` forms of its key and value.
    pub fn from_event<K, V>(event: &MapEvent<K, V>) -> Self
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        Self {
            timestamp: DateTime::<Utc>::from(event.timestamp),
            action: event.action.into(),
            key: event.key.to_string(),
            value: event.value.as_ref().map(ToString::to_string),
            state: event.desired_action.into(),
            error: event.last_error.as_ref().map(ToString::to_string),
        }
    }
}

/// Events of one map, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEventList {
    /// Name of the map.
    pub map: MapName,
    /// Events, oldest first.
    pub events: Vec<MapEventRecord>,
}

#[cfg(test)]
mod tests {
    use super::{EventAction, EventState, MapEventRecord};
    use mapev_engine::{MapError, MapEvent};
    use std::time::{Duration, SystemTime};

    #[test]
    fn failed_update_renders_state_and_error() {
        let event = MapEvent::<u32, u64>::update(7, 70, Err(MapError::MapFull { max_entries: 4 }))
            .at(
                SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                tokio::time::Instant::now(),
            );
        let record = MapEventRecord::from_event(&event);
        assert_eq!(record.action, EventAction::Update);
        assert_eq!(record.key, "7");
        assert_eq!(record.value.as_deref(), Some("70"));
        assert_eq!(record.state, EventState::ToBeInserted);
        assert_eq!(record.state.to_string(), "to-be-inserted");
        assert_eq!(record.error.as_deref(), Some("map is full (4 entries)"));

        let json = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");
        assert_eq!(json["action"], "update");
        assert_eq!(json["state"], "to-be-inserted");

        let back: MapEventRecord = serde_json::from_value(json).expect("record should deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn delete_omits_value() {
        let event = MapEvent::<u32, u64>::delete(3, Ok(()));
        let record = MapEventRecord::from_event(&event);
        assert_eq!(record.action.to_string(), "delete");
        let json = serde_json::to_value(&record).expect("record should serialize");
        assert!(json.get("value").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["state"], "sync");
    }
}
