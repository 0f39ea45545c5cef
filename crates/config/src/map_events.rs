// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Map declarations and their events-buffer policies.

use crate::Description;
use crate::error::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of a BPF map (for example `cilium_ipcache`).
#[derive(
    Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(try_from = "String", into = "String")]
#[schemars(with = "String")]
pub struct MapName(String);

impl MapName {
    /// Parses and validates a map name.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("map name must be non-empty".to_owned());
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(format!("map name `{trimmed}` must not contain whitespace"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the map name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the owned map name.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for MapName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for MapName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MapName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MapName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<MapName> for String {
    fn from(value: MapName) -> Self {
        value.0
    }
}

impl From<&MapName> for Cow<'static, str> {
    fn from(value: &MapName) -> Self {
        Cow::Owned(value.0.clone())
    }
}

impl From<&'static str> for MapName {
    fn from(value: &'static str) -> Self {
        Self::parse(value).expect("invalid static map name literal")
    }
}

/// When expired events are removed from the ring.
///
/// Both modes bound the buffer by age. `Inline` pays the compaction cost on
/// every insert; `Periodic` moves it to a background controller running every
/// TTL, so an expired event may stay buffered for up to one extra TTL (it is
/// still hidden from valid-only dumps).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompactionMode {
    /// Compact on every insert, inside the map write lock.
    Inline,
    /// Compact from a background controller every TTL.
    #[default]
    Periodic,
}

impl std::fmt::Display for CompactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Inline => "inline",
            Self::Periodic => "periodic",
        };
        f.write_str(value)
    }
}

/// Events-buffer policy for one map.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Whether mutations of this map are recorded at all.
    #[serde(default)]
    pub enabled: bool,
    /// Ring capacity. Once full, the oldest event is overwritten. `0` keeps no history.
    #[serde(default = "default_events_max_size")]
    pub max_size: usize,
    /// Maximum event age in milliseconds. `0` disables age-based expiry.
    #[serde(default)]
    pub ttl_ms: u64,
    /// When expired events are removed from the ring.
    #[serde(default)]
    pub compaction: CompactionMode,
    /// Number of batches each live subscriber may have queued before it is evicted.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: default_events_max_size(),
            ttl_ms: 0,
            compaction: CompactionMode::default(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

impl EventsConfig {
    /// An enabled policy with the given ring size and TTL (zero disables expiry).
    #[must_use]
    pub fn enabled(max_size: usize, ttl: Duration) -> Self {
        Self {
            enabled: true,
            max_size,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// Returns a copy with a different compaction mode.
    #[must_use]
    pub fn with_compaction(mut self, compaction: CompactionMode) -> Self {
        self.compaction = compaction;
        self
    }

    /// Returns a copy with a different subscriber queue capacity.
    #[must_use]
    pub fn with_subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity;
        self
    }

    /// Event time-to-live, `None` when expiry is disabled.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }

    /// Returns validation errors for this policy.
    #[must_use]
    pub fn validation_errors(&self, path_prefix: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if self.enabled && self.subscriber_queue_capacity == 0 {
            errors.push(format!(
                "{path_prefix}.subscriber_queue_capacity must be greater than 0"
            ));
        }
        if self.ttl_ms > 0 && self.max_size == 0 {
            errors.push(format!(
                "{path_prefix}.ttl_ms has no effect when {path_prefix}.max_size is 0"
            ));
        }
        errors
    }
}

/// A named map declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MapSpec {
    /// Optional human-readable description of the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    /// Maximum number of entries the backing store accepts.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Events-buffer policy.
    #[serde(default)]
    pub events: EventsConfig,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self {
            description: None,
            max_entries: default_max_entries(),
            events: EventsConfig::default(),
        }
    }
}

impl MapSpec {
    /// Returns validation errors for this map specification.
    #[must_use]
    pub fn validation_errors(&self, path_prefix: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_entries == 0 {
            errors.push(format!("{path_prefix}.max_entries must be greater than 0"));
        }
        errors.extend(
            self.events
                .validation_errors(&format!("{path_prefix}.events")),
        );
        errors
    }
}

/// Root configuration document: a set of maps keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MapEventsDocument {
    /// Declared maps.
    #[serde(default)]
    pub maps: BTreeMap<MapName, MapSpec>,
}

impl MapEventsDocument {
    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let doc: Self =
            serde_yaml::from_str(yaml).map_err(|e| Error::DeserializationError {
                format: "yaml",
                details: e.to_string(),
            })?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let doc: Self =
            serde_json::from_str(json).map_err(|e| Error::DeserializationError {
                format: "json",
                details: e.to_string(),
            })?;
        doc.validate()?;
        Ok(doc)
    }

    /// Loads a document from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Err(Error::UnsupportedFileFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Returns every validation error of the document.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<String> {
        self.maps
            .iter()
            .flat_map(|(name, spec)| spec.validation_errors(&format!("maps.{name}")))
            .collect()
    }

    /// Fails with all validation errors joined when the document is invalid.
    pub fn validate(&self) -> Result<(), Error> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidUserConfig {
                error: errors.join("; "),
            })
        }
    }

    /// JSON schema of the document format.
    #[must_use]
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(MapEventsDocument);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}

const fn default_events_max_size() -> usize {
    1024
}

/// Sized so that a consumer keeping up with ~100 map operations per second
/// survives bursts of several orders of magnitude without being evicted.
const fn default_subscriber_queue_capacity() -> usize {
    1 << 14
}

const fn default_max_entries() -> usize {
    65_536
}
