//! Tamper-evident authorship process logs.
//!
//! A [`Session`] records how a document was composed as an ordered sequence
//! of typed [`Event`]s. Each appended event is chained to its predecessor
//! with a SHA-256 digest over its canonical JSON bytes, the previous digest,
//! and the session id, so any third party can confirm the log was not
//! altered or reordered after the fact. The chain head can additionally be
//! signed with Ed25519.
//!
//! # Example
//!
//! ```
//! use twff_log::{Event, Session};
//!
//! let mut session = Session::new("anon-7f3a");
//! session.append(Event::session_start("2026-08-07T10:00:00Z").unwrap()).unwrap();
//! session.append(Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap()).unwrap();
//! session.append(Event::session_end("2026-08-07T10:02:30Z").unwrap()).unwrap();
//!
//! let summary = twff_log::verify_chain(&session).unwrap();
//! assert_eq!(summary.events_verified, 3);
//! ```

mod chain;
mod signature;
mod types;
mod verify;

pub use chain::{
    canonical_payload, compute_event_hash, ChainError, CHAIN_ALGORITHM, GENESIS_HASH,
};
pub use signature::{keygen, sign_head, verify_head, SignatureBlock};
pub use types::{
    now_timestamp, parse_timestamp, Event, EventError, EventType, Integrity, Session,
    DEFAULT_CONTENT_SOURCE, FORMAT_VERSION,
};
pub use verify::{repair_chain, verify_chain, ChainSummary, RepairReport};
