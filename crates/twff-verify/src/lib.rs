//! Verifier surface: schema check, chain check, offset check, one report.
//!
//! The report is the externally consumed contract. Schema and chain
//! integrity are independent axes: a structurally sloppy log can carry an
//! intact chain, and a pristine-looking one can be tampered. Only a
//! structural failure (unreadable archive or log) prevents a report from
//! being produced at all.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use twff_container::{check_offsets, unpack, ContainerError};
use twff_log::{verify_chain, ChainError, Session};
use twff_schema::{Validator, Violation};

/// Aggregated verification result.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_valid: bool,
    pub chain_intact: bool,
    pub event_count: usize,
    pub violations: Vec<Violation>,
}

impl Report {
    /// True when every axis passed.
    pub fn passed(&self) -> bool {
        self.schema_valid && self.chain_intact
    }
}

/// Verify an in-memory session, optionally checking offsets against content.
pub fn verify_session(session: &Session, content: Option<&str>, strict: bool) -> Report {
    let validator = if strict {
        Validator::strict()
    } else {
        Validator::new()
    };
    let mut violations = validator.validate_session(session);
    let schema_valid = violations.is_empty();

    let chain_intact = match verify_chain(session) {
        Ok(_) => true,
        Err(err) => {
            violations.push(chain_violation(&err));
            false
        }
    };

    if let Some(content) = content {
        // Advisory only: offset drift does not fail the report.
        violations.extend(check_offsets(content, session));
    }

    Report {
        schema_valid,
        chain_intact,
        event_count: session.events.len(),
        violations,
    }
}

/// Verify a raw log document (schema first, chain if it parses as a session).
pub fn verify_document(doc: &Value, strict: bool) -> Report {
    let validator = if strict {
        Validator::strict()
    } else {
        Validator::new()
    };
    let mut violations = validator.validate(doc);
    let schema_valid = violations.is_empty();

    let (chain_intact, event_count) = match serde_json::from_value::<Session>(doc.clone()) {
        Ok(session) => {
            let intact = match verify_chain(&session) {
                Ok(_) => true,
                Err(err) => {
                    violations.push(chain_violation(&err));
                    false
                }
            };
            (intact, session.events.len())
        }
        Err(err) => {
            violations.push(Violation::new(
                "(root)",
                format!("chain not checked: document is not a session ({err})"),
            ));
            let event_count = doc
                .get("events")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            (false, event_count)
        }
    };

    Report {
        schema_valid,
        chain_intact,
        event_count,
        violations,
    }
}

/// Unpack a container and verify its log, offsets included.
pub fn verify_container(bytes: &[u8], strict: bool) -> Result<Report, ContainerError> {
    let unpacked = unpack(bytes)?;
    Ok(verify_session(
        &unpacked.session,
        Some(&unpacked.content),
        strict,
    ))
}

/// Read and verify a bare `process-log.json` file.
pub fn verify_log_file(path: &Path, strict: bool) -> Result<Report, ContainerError> {
    let text = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&text).map_err(|source| ContainerError::InvalidJson {
        entry: path.display().to_string(),
        source,
    })?;
    Ok(verify_document(&doc, strict))
}

fn chain_violation(err: &ChainError) -> Violation {
    let path = match err {
        ChainError::ChainBroken { index } => format!("events[{index}]"),
        ChainError::NonMonotonicTimestamp { index, .. } => format!("events[{index}].timestamp"),
        ChainError::InvalidEvent { index, .. } => format!("events[{index}]"),
        ChainError::HeadMismatch { .. } => "_integrity.head_hash".to_string(),
        _ => "(chain)".to_string(),
    };
    Violation::new(path, err.to_string())
}
