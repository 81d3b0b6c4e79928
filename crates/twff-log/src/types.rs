//! TWFF process-log data structures.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Format version written into new sessions.
pub const FORMAT_VERSION: &str = "0.1";

/// Default `content_source` path, matching the container layout.
pub const DEFAULT_CONTENT_SOURCE: &str = "content/document.xhtml";

/// Errors raised while constructing an [`Event`].
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event type: {0:?}")]
    InvalidEventType(String),

    #[error("invalid ISO-8601 timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("event type {event_type} requires meta field {field:?}")]
    MissingMetaField {
        event_type: EventType,
        field: &'static str,
    },

    #[error("meta field {field:?} must be a scalar value")]
    NonScalarMeta { field: String },

    #[error("meta field {field:?} has value {value:?}; allowed: {allowed:?}")]
    InvalidMetaValue {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

/// The closed set of authorship event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    Edit,
    Paste,
    AiInteraction,
    ChatInteraction,
    FocusChange,
    Checkpoint,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::SessionStart,
        EventType::SessionEnd,
        EventType::Edit,
        EventType::Paste,
        EventType::AiInteraction,
        EventType::ChatInteraction,
        EventType::FocusChange,
        EventType::Checkpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "session_start",
            EventType::SessionEnd => "session_end",
            EventType::Edit => "edit",
            EventType::Paste => "paste",
            EventType::AiInteraction => "ai_interaction",
            EventType::ChatInteraction => "chat_interaction",
            EventType::FocusChange => "focus_change",
            EventType::Checkpoint => "checkpoint",
        }
    }

    /// Meta fields that must be present for this event type.
    pub fn required_meta(&self) -> &'static [&'static str] {
        match self {
            EventType::SessionStart | EventType::SessionEnd => &[],
            EventType::Edit => &["char_delta", "source"],
            EventType::Paste => &["char_count", "source"],
            EventType::AiInteraction => {
                &["interaction_type", "model", "output_length", "acceptance"]
            }
            EventType::ChatInteraction => &["message_count", "source_file"],
            EventType::FocusChange => &["duration_ms"],
            EventType::Checkpoint => &["char_count_total"],
        }
    }

    /// Meta fields that may be present in addition to the required ones.
    pub fn optional_meta(&self) -> &'static [&'static str] {
        match self {
            EventType::SessionStart | EventType::SessionEnd | EventType::FocusChange => &[],
            EventType::Edit | EventType::Paste => &["position_start", "position_end"],
            EventType::AiInteraction => &[
                "input_preview",
                "output_preview",
                "position_start",
                "position_end",
            ],
            EventType::ChatInteraction => &["message_preview"],
            EventType::Checkpoint => &["position"],
        }
    }

    /// Allowed values for enum-valued meta fields of this event type.
    ///
    /// `interaction_type` includes `completion`, which the reference editor
    /// emits when an inline ghost completion is accepted.
    pub fn allowed_values(&self, field: &str) -> Option<&'static [&'static str]> {
        match (self, field) {
            (EventType::Edit, "source") => Some(&["human", "ai", "external"]),
            (EventType::Paste, "source") => Some(&["external", "ai"]),
            (EventType::AiInteraction, "interaction_type") => Some(&[
                "brainstorm",
                "draft",
                "paraphrase",
                "summarize",
                "expand",
                "continue",
                "completion",
            ]),
            (EventType::AiInteraction, "acceptance") => Some(&[
                "fully_accepted",
                "partially_accepted",
                "rejected",
                "modified",
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| EventError::InvalidEventType(s.to_string()))
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2026-08-07T10:00:00Z`, `…+00:00`) and naive ISO
/// timestamps without an offset, which are read as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EventError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Err(EventError::InvalidTimestamp(value.to_string()))
}

/// Current time as an RFC 3339 string, the form new sessions stamp.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A single authorship event.
///
/// The timestamp is kept as the original ISO-8601 text so that
/// re-serialization is byte-stable; logs written by other producers verify
/// without reformatting drift. `meta` is a sorted map of scalar values;
/// `_hash` is set by the chain, never by the producer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub timestamp: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default)]
    pub meta: BTreeMap<String, Value>,

    #[serde(rename = "_hash", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Event {
    /// Construct a validated, unhashed event.
    ///
    /// Rejects unparsable timestamps, missing required meta fields,
    /// non-scalar meta values, and enum-valued fields outside their set.
    pub fn new(
        event_type: EventType,
        timestamp: impl Into<String>,
        meta: BTreeMap<String, Value>,
    ) -> Result<Self, EventError> {
        let timestamp = timestamp.into();
        parse_timestamp(&timestamp)?;

        for &field in event_type.required_meta() {
            if !meta.contains_key(field) {
                return Err(EventError::MissingMetaField { event_type, field });
            }
        }
        for (key, value) in &meta {
            if value.is_array() || value.is_object() {
                return Err(EventError::NonScalarMeta { field: key.clone() });
            }
        }
        for &field in event_type.required_meta() {
            if let Some(allowed) = event_type.allowed_values(field) {
                let value = &meta[field];
                let matches = value.as_str().is_some_and(|s| allowed.contains(&s));
                if !matches {
                    return Err(EventError::InvalidMetaValue {
                        field,
                        value: value.to_string(),
                        allowed,
                    });
                }
            }
        }

        Ok(Event {
            timestamp,
            event_type,
            meta,
            hash: None,
        })
    }

    pub fn session_start(timestamp: impl Into<String>) -> Result<Self, EventError> {
        Event::new(EventType::SessionStart, timestamp, BTreeMap::new())
    }

    pub fn session_end(timestamp: impl Into<String>) -> Result<Self, EventError> {
        Event::new(EventType::SessionEnd, timestamp, BTreeMap::new())
    }

    pub fn edit(
        timestamp: impl Into<String>,
        char_delta: i64,
        source: &str,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert("char_delta".to_string(), Value::from(char_delta));
        meta.insert("source".to_string(), Value::from(source));
        Event::new(EventType::Edit, timestamp, meta)
    }

    pub fn paste(
        timestamp: impl Into<String>,
        char_count: u64,
        source: &str,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert("char_count".to_string(), Value::from(char_count));
        meta.insert("source".to_string(), Value::from(source));
        Event::new(EventType::Paste, timestamp, meta)
    }

    pub fn ai_interaction(
        timestamp: impl Into<String>,
        interaction_type: &str,
        model: &str,
        output_length: u64,
        acceptance: &str,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert(
            "interaction_type".to_string(),
            Value::from(interaction_type),
        );
        meta.insert("model".to_string(), Value::from(model));
        meta.insert("output_length".to_string(), Value::from(output_length));
        meta.insert("acceptance".to_string(), Value::from(acceptance));
        Event::new(EventType::AiInteraction, timestamp, meta)
    }

    pub fn chat_interaction(
        timestamp: impl Into<String>,
        message_count: u64,
        source_file: &str,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert("message_count".to_string(), Value::from(message_count));
        meta.insert("source_file".to_string(), Value::from(source_file));
        Event::new(EventType::ChatInteraction, timestamp, meta)
    }

    pub fn focus_change(
        timestamp: impl Into<String>,
        duration_ms: u64,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert("duration_ms".to_string(), Value::from(duration_ms));
        Event::new(EventType::FocusChange, timestamp, meta)
    }

    pub fn checkpoint(
        timestamp: impl Into<String>,
        char_count_total: u64,
    ) -> Result<Self, EventError> {
        let mut meta = BTreeMap::new();
        meta.insert("char_count_total".to_string(), Value::from(char_count_total));
        Event::new(EventType::Checkpoint, timestamp, meta)
    }

    /// Anchor the event to a character span in the content entry.
    ///
    /// Only meaningful before the event is appended to a chain.
    pub fn with_span(mut self, position_start: u64, position_end: u64) -> Self {
        self.meta
            .insert("position_start".to_string(), Value::from(position_start));
        self.meta
            .insert("position_end".to_string(), Value::from(position_end));
        self
    }

    /// Attach an additional scalar meta field (previews, totals, ...).
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

/// Chain anchor written at the end of a session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Integrity {
    pub algorithm: String,
    pub chain_length: usize,
    pub head_hash: String,
    pub session_id: String,
    pub note: String,
}

/// One writing session: identity fields plus the ordered, chained events.
///
/// `session_id` and `events` are the only fields deserialization insists
/// on; the schema validator reports the rest, so a sloppy log can still
/// have its chain checked independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(default)]
    pub version: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub start_time: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(default)]
    pub content_source: String,
    pub events: Vec<Event>,

    #[serde(rename = "_integrity", default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

impl Session {
    /// Open a new session with a fresh v4 session id, stamped now.
    pub fn new(user_id: impl Into<String>) -> Self {
        Session {
            version: FORMAT_VERSION.to_string(),
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            start_time: now_timestamp(),
            end_time: None,
            content_source: DEFAULT_CONTENT_SOURCE.to_string(),
            events: Vec::new(),
            integrity: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
