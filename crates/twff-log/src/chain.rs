//! Hash-chain construction: canonical event bytes, per-link digests, append.

use crate::types::{parse_timestamp, Event, EventType, Integrity, Session};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Previous-hash value for the first link in a chain.
pub const GENESIS_HASH: &str = "";

/// Algorithm label written into the `_integrity` block.
pub const CHAIN_ALGORITHM: &str = "SHA-256-CHAIN";

const INTEGRITY_NOTE: &str = "Per-event chained SHA-256 over canonical JSON.";

/// Errors raised by chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("session is closed; no events may be appended after session_end")]
    ChainClosed,

    #[error(
        "non-monotonic timestamp at index {index}: {timestamp:?} is earlier than {previous:?}"
    )]
    NonMonotonicTimestamp {
        index: usize,
        timestamp: String,
        previous: String,
    },

    #[error("chain broken at event index {index}")]
    ChainBroken { index: usize },

    #[error("chain has no events")]
    ChainTruncated,

    #[error("_integrity.head_hash mismatch: expected {expected}, stored {stored}")]
    HeadMismatch { expected: String, stored: String },

    #[error("event at index {index} is invalid: {reason}")]
    InvalidEvent { index: usize, reason: String },

    #[error("malformed signature block: {0}")]
    MalformedSignature(String),

    #[error("signature by {signer} failed verification")]
    SignatureInvalid { signer: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Canonical byte encoding of an event, excluding `_hash`.
///
/// Compact JSON with object keys sorted lexicographically; serde_json's
/// default BTreeMap-backed object map supplies the ordering. Two logically
/// equal events serialize to identical bytes regardless of the key order
/// they were built or parsed with.
pub fn canonical_payload(event: &Event) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(event)?;
    if let Value::Object(map) = &mut value {
        map.remove("_hash");
    }
    serde_json::to_string(&value)
}

/// Compute one chain link: `SHA-256(canonical ∥ "|" ∥ prev ∥ "|" ∥ session_id)`.
///
/// Binding the session id into every link prevents a chain from being
/// transplanted between sessions. Digests are lowercase hex.
pub fn compute_event_hash(
    event: &Event,
    previous_hash: &str,
    session_id: &str,
) -> Result<String, serde_json::Error> {
    let payload = canonical_payload(event)?;
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(b"|");
    hasher.update(previous_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(session_id.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub(crate) fn integrity_for(session: &Session, head_hash: &str) -> Integrity {
    Integrity {
        algorithm: CHAIN_ALGORITHM.to_string(),
        chain_length: session.events.len(),
        head_hash: head_hash.to_string(),
        session_id: session.session_id.clone(),
        note: INTEGRITY_NOTE.to_string(),
    }
}

impl Session {
    /// Append an event, chaining its digest onto the current tip.
    ///
    /// Fails with [`ChainError::ChainClosed`] once a `session_end` has been
    /// recorded, and with [`ChainError::NonMonotonicTimestamp`] if the event
    /// is timestamped earlier than the last appended one. The session is
    /// unchanged on failure. Returns the new tip digest.
    pub fn append(&mut self, mut event: Event) -> Result<String, ChainError> {
        if self.is_closed() {
            return Err(ChainError::ChainClosed);
        }

        let index = self.events.len();
        let ts = parse_timestamp(&event.timestamp).map_err(|err| ChainError::InvalidEvent {
            index,
            reason: err.to_string(),
        })?;
        if let Some(last) = self.events.last() {
            let last_ts =
                parse_timestamp(&last.timestamp).map_err(|err| ChainError::InvalidEvent {
                    index: index - 1,
                    reason: err.to_string(),
                })?;
            if ts < last_ts {
                return Err(ChainError::NonMonotonicTimestamp {
                    index,
                    timestamp: event.timestamp.clone(),
                    previous: last.timestamp.clone(),
                });
            }
        }

        let previous = self
            .events
            .last()
            .and_then(|e| e.hash.as_deref())
            .unwrap_or(GENESIS_HASH);
        let digest = compute_event_hash(&event, previous, &self.session_id)?;
        event.hash = Some(digest.clone());

        if event.event_type == EventType::SessionEnd {
            self.end_time = Some(event.timestamp.clone());
        }
        self.events.push(event);
        self.integrity = Some(integrity_for(self, &digest));

        Ok(digest)
    }

    /// Current chain tip, if any event has been chained.
    pub fn head_hash(&self) -> Option<&str> {
        self.events.last().and_then(|e| e.hash.as_deref())
    }

    /// Read a session document from a `process-log.json` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Session, ChainError> {
        let contents = fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&contents)?;
        Ok(session)
    }

    /// Write the session document as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ChainError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;
    use std::collections::BTreeMap;

    fn open_session() -> Session {
        let mut session = Session::new("anon-test");
        session.start_time = "2026-08-07T10:00:00Z".to_string();
        session
    }

    #[test]
    fn test_append_sets_hash_and_integrity() {
        let mut session = open_session();
        let digest = session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();

        assert_eq!(session.events[0].hash.as_deref(), Some(digest.as_str()));
        let integrity = session.integrity.as_ref().unwrap();
        assert_eq!(integrity.algorithm, CHAIN_ALGORITHM);
        assert_eq!(integrity.chain_length, 1);
        assert_eq!(integrity.head_hash, digest);
        assert_eq!(integrity.session_id, session.session_id);
    }

    #[test]
    fn test_append_links_to_previous() {
        let mut session = open_session();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        let first = session.head_hash().unwrap().to_string();

        session
            .append(Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap())
            .unwrap();
        let event = &session.events[1];
        let expected = compute_event_hash(event, &first, &session.session_id).unwrap();
        assert_eq!(event.hash.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_append_after_session_end_fails() {
        let mut session = open_session();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::session_end("2026-08-07T10:02:30Z").unwrap())
            .unwrap();
        assert_eq!(session.end_time.as_deref(), Some("2026-08-07T10:02:30Z"));

        let err = session
            .append(Event::edit("2026-08-07T10:03:00Z", 1, "human").unwrap())
            .unwrap_err();
        assert!(matches!(err, ChainError::ChainClosed));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_non_monotonic_timestamp_leaves_session_unchanged() {
        let mut session = open_session();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::edit("2026-08-07T10:00:05Z", 3, "human").unwrap())
            .unwrap();
        let snapshot = session.clone();

        let err = session
            .append(Event::edit("2026-08-07T10:00:04Z", 2, "human").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::NonMonotonicTimestamp { index: 2, .. }
        ));
        assert_eq!(session, snapshot);
    }

    #[test]
    fn test_equal_timestamps_are_allowed() {
        let mut session = open_session();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        assert!(session
            .append(Event::edit("2026-08-07T10:00:00Z", 1, "human").unwrap())
            .is_ok());
    }

    #[test]
    fn test_canonical_payload_is_key_order_independent() {
        // Same logical event, meta built in opposite insertion orders.
        let mut forward = BTreeMap::new();
        forward.insert("char_delta".to_string(), serde_json::Value::from(15));
        forward.insert("source".to_string(), serde_json::Value::from("human"));
        let mut backward = BTreeMap::new();
        backward.insert("source".to_string(), serde_json::Value::from("human"));
        backward.insert("char_delta".to_string(), serde_json::Value::from(15));

        let a = Event::new(EventType::Edit, "2026-08-07T10:00:01Z", forward).unwrap();
        let b = Event::new(EventType::Edit, "2026-08-07T10:00:01Z", backward).unwrap();
        assert_eq!(
            canonical_payload(&a).unwrap(),
            canonical_payload(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_payload_excludes_hash() {
        let mut event = Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap();
        let before = canonical_payload(&event).unwrap();
        event.hash = Some("deadbeef".to_string());
        assert_eq!(before, canonical_payload(&event).unwrap());
    }

    #[test]
    fn test_hash_depends_on_session_id() {
        let event = Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap();
        let a = compute_event_hash(&event, GENESIS_HASH, "session-a").unwrap();
        let b = compute_event_hash(&event, GENESIS_HASH, "session-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_depends_on_previous() {
        let event = Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap();
        let a = compute_event_hash(&event, GENESIS_HASH, "s").unwrap();
        let b = compute_event_hash(&event, &a, "s").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_digest_is_stable() {
        // Pins the wire format: canonical JSON + "|" + prev + "|" + session_id.
        let event = Event::session_start("2026-08-07T10:00:00Z").unwrap();
        let payload = canonical_payload(&event).unwrap();
        assert_eq!(
            payload,
            r#"{"meta":{},"timestamp":"2026-08-07T10:00:00Z","type":"session_start"}"#
        );

        let digest = compute_event_hash(&event, GENESIS_HASH, "fixed-session").unwrap();
        let mut hasher = Sha256::new();
        hasher.update(format!("{payload}||fixed-session").as_bytes());
        assert_eq!(digest, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process-log.json");

        let mut session = open_session();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::paste("2026-08-07T10:00:05Z", 450, "external").unwrap())
            .unwrap();
        session.save(&path).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert_eq!(session, loaded);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Session::load(&path),
            Err(ChainError::Serialization(_))
        ));
    }
}
