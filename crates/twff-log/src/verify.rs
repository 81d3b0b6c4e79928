//! Chain verification and explicit repair.

use crate::chain::{compute_event_hash, integrity_for, ChainError, GENESIS_HASH};
use crate::types::Session;

/// Successful verification result: how much was checked and the tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub events_verified: usize,
    pub head_hash: String,
}

/// Result of a repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub events_rehashed: usize,
    pub head_hash: String,
}

/// Recompute the chain from genesis and compare against the stored hashes.
///
/// Fails with [`ChainError::ChainBroken`] at the first index whose stored
/// `_hash` does not match the recomputed digest; an event with no `_hash` at
/// all also breaks the chain there. Once one link is broken every later
/// digest is meaningless, so verification halts rather than reporting the
/// cascade. Pure: reads only its input.
pub fn verify_chain(session: &Session) -> Result<ChainSummary, ChainError> {
    if session.events.is_empty() {
        return Err(ChainError::ChainTruncated);
    }

    let mut previous = GENESIS_HASH.to_string();
    for (index, event) in session.events.iter().enumerate() {
        let expected = compute_event_hash(event, &previous, &session.session_id)?;
        match event.hash.as_deref() {
            Some(stored) if stored == expected => {}
            _ => return Err(ChainError::ChainBroken { index }),
        }
        previous = expected;
    }

    if let Some(integrity) = &session.integrity {
        if !integrity.head_hash.is_empty() && integrity.head_hash != previous {
            return Err(ChainError::HeadMismatch {
                expected: previous,
                stored: integrity.head_hash.clone(),
            });
        }
    }

    Ok(ChainSummary {
        events_verified: session.events.len(),
        head_hash: previous,
    })
}

/// Recompute and overwrite every `_hash` from genesis forward.
///
/// This is the explicit, audit-breaking bootstrap for legacy logs that
/// predate chaining. It is never invoked by [`verify_chain`], and callers
/// presenting results must report a repair as a repair, not a verification.
/// Idempotent: repairing an already-consistent chain changes nothing.
pub fn repair_chain(session: &mut Session) -> Result<RepairReport, ChainError> {
    let session_id = session.session_id.clone();
    let mut previous = GENESIS_HASH.to_string();
    for event in &mut session.events {
        let digest = compute_event_hash(event, &previous, &session_id)?;
        event.hash = Some(digest.clone());
        previous = digest;
    }

    session.integrity = if session.events.is_empty() {
        None
    } else {
        Some(integrity_for(session, &previous))
    };

    Ok(RepairReport {
        events_rehashed: session.events.len(),
        head_hash: previous,
    })
}
