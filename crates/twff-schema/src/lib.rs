//! Structural validation of session documents.
//!
//! [`Validator::validate`] checks a raw JSON document against the published
//! field, type, and enumeration constraints and returns every violation it
//! finds instead of failing fast, so a caller can report all problems at
//! once. It is independent of chain integrity: hashes are never recomputed
//! here, and a structurally broken log can still carry an internally
//! consistent chain (and vice versa).

use serde::Serialize;
use serde_json::Value;
use twff_log::{parse_timestamp, EventType, Session};
use uuid::Uuid;

/// One structural problem, addressed by its path in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Schema validator. Lenient by default: meta fields beyond the defined set
/// are ignored, matching the format's extensibility principle. Strict mode
/// flags them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    strict: bool,
}

const REQUIRED_FIELDS: &[&str] = &["version", "session_id", "events"];
const STRING_FIELDS: &[&str] = &[
    "version",
    "session_id",
    "user_id",
    "start_time",
    "end_time",
    "content_source",
];

impl Validator {
    pub fn new() -> Self {
        Validator { strict: false }
    }

    pub fn strict() -> Self {
        Validator { strict: true }
    }

    /// Validate a session document. An empty result means structurally valid.
    pub fn validate(&self, doc: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();

        let Some(root) = doc.as_object() else {
            violations.push(Violation::new("(root)", "document is not a JSON object"));
            return violations;
        };

        for field in REQUIRED_FIELDS {
            if !root.contains_key(*field) {
                violations.push(Violation::new(*field, "required field is missing"));
            }
        }

        for field in STRING_FIELDS {
            if let Some(value) = root.get(*field) {
                if !value.is_string() {
                    violations.push(Violation::new(*field, "expected a string"));
                }
            }
        }

        if let Some(session_id) = root.get("session_id").and_then(Value::as_str) {
            if Uuid::parse_str(session_id).is_err() {
                violations.push(Violation::new("session_id", "not a valid UUID"));
            }
        }

        let start = self.check_time(root, "start_time", &mut violations);
        let end = self.check_time(root, "end_time", &mut violations);
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                violations.push(Violation::new("end_time", "end_time precedes start_time"));
            }
        }

        if let Some(events) = root.get("events") {
            match events.as_array() {
                Some(events) => self.check_events(events, root, &mut violations),
                None => violations.push(Violation::new("events", "expected an array")),
            }
        }

        if let Some(integrity) = root.get("_integrity") {
            self.check_integrity(integrity, root, &mut violations);
        }

        violations
    }

    /// Validate an in-memory session by serializing it first.
    pub fn validate_session(&self, session: &Session) -> Vec<Violation> {
        match serde_json::to_value(session) {
            Ok(doc) => self.validate(&doc),
            Err(err) => vec![Violation::new(
                "(root)",
                format!("session failed to serialize: {err}"),
            )],
        }
    }

    fn check_time(
        &self,
        root: &serde_json::Map<String, Value>,
        field: &str,
        violations: &mut Vec<Violation>,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        let value = root.get(field)?.as_str()?;
        match parse_timestamp(value) {
            Ok(ts) => Some(ts),
            Err(_) => {
                violations.push(Violation::new(field, "not an ISO-8601 timestamp"));
                None
            }
        }
    }

    fn check_events(
        &self,
        events: &[Value],
        root: &serde_json::Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let mut previous_ts = None;

        for (i, event) in events.iter().enumerate() {
            let Some(obj) = event.as_object() else {
                violations.push(Violation::new(format!("events[{i}]"), "expected an object"));
                continue;
            };

            match obj.get("timestamp").map(|v| (v, v.as_str())) {
                None => violations.push(Violation::new(
                    format!("events[{i}].timestamp"),
                    "required field is missing",
                )),
                Some((_, None)) => violations.push(Violation::new(
                    format!("events[{i}].timestamp"),
                    "expected a string",
                )),
                Some((_, Some(text))) => match parse_timestamp(text) {
                    Err(_) => violations.push(Violation::new(
                        format!("events[{i}].timestamp"),
                        "not an ISO-8601 timestamp",
                    )),
                    Ok(ts) => {
                        if let Some(prev) = previous_ts {
                            if ts < prev {
                                violations.push(Violation::new(
                                    format!("events[{i}].timestamp"),
                                    "earlier than the previous event",
                                ));
                            }
                        }
                        previous_ts = Some(ts);
                    }
                },
            }

            self.check_event_type(obj, i, violations);

            if let Some(hash) = obj.get("_hash") {
                if !hash.is_string() {
                    violations.push(Violation::new(
                        format!("events[{i}]._hash"),
                        "expected a string",
                    ));
                }
            }
        }

        // Bracketing: a session always opens with session_start; a finalized
        // one (end_time set) must close with session_end.
        if let Some(first) = events.first().and_then(|e| e.get("type")).and_then(Value::as_str) {
            if first != "session_start" {
                violations.push(Violation::new(
                    "events[0].type",
                    "first event is not session_start",
                ));
            }
        }
        if root.get("end_time").is_some_and(|v| !v.is_null()) {
            let last = events.last().and_then(|e| e.get("type")).and_then(Value::as_str);
            if let Some(last) = last {
                if last != "session_end" {
                    violations.push(Violation::new(
                        format!("events[{}].type", events.len().saturating_sub(1)),
                        "last event of a finalized session is not session_end",
                    ));
                }
            }
        }
    }

    fn check_event_type(
        &self,
        obj: &serde_json::Map<String, Value>,
        i: usize,
        violations: &mut Vec<Violation>,
    ) {
        let event_type = match obj.get("type").map(|v| (v, v.as_str())) {
            None => {
                violations.push(Violation::new(
                    format!("events[{i}].type"),
                    "required field is missing",
                ));
                return;
            }
            Some((_, None)) => {
                violations.push(Violation::new(
                    format!("events[{i}].type"),
                    "expected a string",
                ));
                return;
            }
            Some((_, Some(text))) => match text.parse::<EventType>() {
                Ok(ty) => ty,
                Err(_) => {
                    violations.push(Violation::new(
                        format!("events[{i}].type"),
                        format!("unknown event type {text:?}"),
                    ));
                    return;
                }
            },
        };

        let empty = serde_json::Map::new();
        let meta = match obj.get("meta") {
            None => &empty,
            Some(value) => match value.as_object() {
                Some(map) => map,
                None => {
                    violations.push(Violation::new(
                        format!("events[{i}].meta"),
                        "expected an object",
                    ));
                    return;
                }
            },
        };

        for field in event_type.required_meta() {
            if !meta.contains_key(*field) {
                violations.push(Violation::new(
                    format!("events[{i}].meta.{field}"),
                    format!("required for type {event_type}"),
                ));
            }
        }

        for (key, value) in meta {
            let path = format!("events[{i}].meta.{key}");

            if value.is_array() || value.is_object() {
                violations.push(Violation::new(&path, "expected a scalar value"));
                continue;
            }
            if let Some(allowed) = event_type.allowed_values(key) {
                let matches = value.as_str().is_some_and(|s| allowed.contains(&s));
                if !matches {
                    violations.push(Violation::new(
                        &path,
                        format!("value {value} not in {allowed:?}"),
                    ));
                }
            }
            if self.strict
                && !event_type.required_meta().contains(&key.as_str())
                && !event_type.optional_meta().contains(&key.as_str())
            {
                violations.push(Violation::new(
                    &path,
                    format!("not defined for type {event_type}"),
                ));
            }
        }
    }

    fn check_integrity(
        &self,
        integrity: &Value,
        root: &serde_json::Map<String, Value>,
        violations: &mut Vec<Violation>,
    ) {
        let Some(obj) = integrity.as_object() else {
            violations.push(Violation::new("_integrity", "expected an object"));
            return;
        };

        for field in ["algorithm", "head_hash", "session_id", "note"] {
            if let Some(value) = obj.get(field) {
                if !value.is_string() {
                    violations.push(Violation::new(
                        format!("_integrity.{field}"),
                        "expected a string",
                    ));
                }
            }
        }

        if let (Some(anchor), Some(session_id)) = (
            obj.get("session_id").and_then(Value::as_str),
            root.get("session_id").and_then(Value::as_str),
        ) {
            if anchor != session_id {
                violations.push(Violation::new(
                    "_integrity.session_id",
                    "does not match the session's id",
                ));
            }
        }

        if let (Some(length), Some(events)) = (
            obj.get("chain_length").and_then(Value::as_u64),
            root.get("events").and_then(Value::as_array),
        ) {
            if length as usize != events.len() {
                violations.push(Violation::new(
                    "_integrity.chain_length",
                    format!("records {length} events, log has {}", events.len()),
                ));
            }
        }
    }
}
