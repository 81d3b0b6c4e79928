//! Full workflow: record a session, sign it, seal a container, verify it,
//! tamper with it, and watch the report change.

use serde_json::Value;
use twff_container::{pack, unpack, Asset, CHAT_ENTRY, SIGNATURES_ENTRY};
use twff_log::{keygen, sign_head, verify_chain, verify_head, Event, Session, SignatureBlock};
use twff_verify::{verify_container, verify_session};

const XHTML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
    <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
    <head><title>Draft</title></head>\n\
    <body><p>Written slowly, with occasional help.</p></body>\n\
    </html>";

fn record_full_session() -> Session {
    let mut session = Session::new("anon-7f3a");
    session.start_time = "2026-08-07T09:00:00Z".to_string();

    session
        .append(Event::session_start("2026-08-07T09:00:00Z").unwrap())
        .unwrap();
    session
        .append(
            Event::edit("2026-08-07T09:00:12Z", 42, "human")
                .unwrap()
                .with_span(0, 42),
        )
        .unwrap();
    session
        .append(
            Event::paste("2026-08-07T09:01:40Z", 18, "external")
                .unwrap()
                .with_span(42, 60),
        )
        .unwrap();
    session
        .append(
            Event::ai_interaction(
                "2026-08-07T09:03:05Z",
                "paraphrase",
                "llama3.2:3b",
                57,
                "partially_accepted",
            )
            .unwrap()
            .with_meta("output_preview", "In other words, the committee"),
        )
        .unwrap();
    session
        .append(Event::chat_interaction("2026-08-07T09:04:00Z", 3, CHAT_ENTRY).unwrap())
        .unwrap();
    session
        .append(Event::focus_change("2026-08-07T09:10:30Z", 390_000).unwrap())
        .unwrap();
    session
        .append(Event::checkpoint("2026-08-07T09:11:00Z", 60).unwrap().with_meta("position", 60))
        .unwrap();
    session
        .append(Event::session_end("2026-08-07T09:12:00Z").unwrap())
        .unwrap();

    session
}

#[test]
fn full_session_chains_and_verifies() {
    let session = record_full_session();
    let summary = verify_chain(&session).unwrap();
    assert_eq!(summary.events_verified, 8);
    assert_eq!(Some(summary.head_hash.as_str()), session.head_hash());

    let report = verify_session(&session, Some(XHTML), false);
    assert!(report.passed(), "violations: {:?}", report.violations);
    assert_eq!(report.event_count, 8);
}

#[test]
fn signed_container_round_trips_and_verifies() {
    let session = record_full_session();
    let (private_key, public_key) = keygen();
    let block = sign_head(&session, &private_key, "author:anon-7f3a").unwrap();

    let assets = vec![
        Asset::new("content/images/figure-1.png", vec![0x89, 0x50, 0x4e, 0x47]),
        Asset::new(CHAT_ENTRY, br#"{"messages": []}"#.to_vec()),
        Asset::new(SIGNATURES_ENTRY, block.to_xml().into_bytes()),
    ];
    let bytes = pack(XHTML, &session, &assets).unwrap();

    // Deterministic packing: same inputs, same bytes.
    assert_eq!(bytes, pack(XHTML, &session, &assets).unwrap());

    let unpacked = unpack(&bytes).unwrap();
    assert_eq!(unpacked.content, XHTML);
    assert_eq!(unpacked.session, session);
    assert_eq!(unpacked.assets.len(), 3);

    let report = verify_container(&bytes, false).unwrap();
    assert!(report.passed());

    let sig = unpacked
        .assets
        .iter()
        .find(|a| a.path == SIGNATURES_ENTRY)
        .unwrap();
    let restored = SignatureBlock::from_xml(std::str::from_utf8(&sig.data).unwrap()).unwrap();
    assert!(verify_head(&unpacked.session, &restored, &public_key).is_ok());
}

#[test]
fn tampering_after_unpack_is_detected_on_reverify() {
    let session = record_full_session();
    let bytes = pack(XHTML, &session, &[]).unwrap();

    let mut unpacked = unpack(&bytes).unwrap();
    unpacked.session.events[3]
        .meta
        .insert("acceptance".to_string(), Value::from("fully_accepted"));

    // Still schema-valid, so it can be resealed...
    let resealed = pack(XHTML, &unpacked.session, &[]).unwrap();
    // ...but the chain gives the edit away, at the edited index.
    let report = verify_container(&resealed, false).unwrap();
    assert!(report.schema_valid);
    assert!(!report.chain_intact);
    assert!(report
        .violations
        .iter()
        .any(|v| v.path == "events[3]"));
}

#[test]
fn reduced_profile_without_offsets_verifies() {
    // The offset-free profile: no position fields anywhere.
    let mut session = Session::new("anon-7f3a");
    session.start_time = "2026-08-07T09:00:00Z".to_string();
    session
        .append(Event::session_start("2026-08-07T09:00:00Z").unwrap())
        .unwrap();
    session
        .append(Event::edit("2026-08-07T09:00:30Z", 5, "human").unwrap())
        .unwrap();
    session
        .append(Event::session_end("2026-08-07T09:01:00Z").unwrap())
        .unwrap();

    let bytes = pack(XHTML, &session, &[]).unwrap();
    let report = verify_container(&bytes, false).unwrap();
    assert!(report.passed());
    assert!(report.violations.is_empty());
}

#[test]
fn merged_followup_session_starts_its_own_chain() {
    // Re-opening an exported document starts a new session; the old chain
    // is never spliced into.
    let first = record_full_session();

    let mut second = Session::new("anon-7f3a");
    second.start_time = "2026-08-08T14:00:00Z".to_string();
    second
        .append(Event::session_start("2026-08-08T14:00:00Z").unwrap())
        .unwrap();
    second
        .append(Event::edit("2026-08-08T14:00:10Z", -6, "human").unwrap())
        .unwrap();

    assert_ne!(first.session_id, second.session_id);
    assert!(verify_chain(&first).is_ok());
    // An open follow-up session verifies too; end_time is simply unset.
    assert!(verify_chain(&second).is_ok());

    // The same events hash differently under the second session's id, so
    // links can never be transplanted between the two logs.
    let replayed = Event::edit("2026-08-08T14:00:10Z", -6, "human").unwrap();
    let under_first =
        twff_log::compute_event_hash(&replayed, "", &first.session_id).unwrap();
    let under_second =
        twff_log::compute_event_hash(&replayed, "", &second.session_id).unwrap();
    assert_ne!(under_first, under_second);
}
