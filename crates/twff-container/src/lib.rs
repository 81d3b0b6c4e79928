//! The `.twff` container: a ZIP archive packaging the final document, its
//! process log, and optional assets under fixed paths.
//!
//! Packing is deterministic: fixed entry order, fixed archive timestamps,
//! fixed compression settings. The same logical inputs produce
//! byte-identical archives, so whole containers can be hashed reproducibly,
//! not just their logs. Unpacking never verifies the chain; that is a
//! separate, explicit step.

use serde_json::Value;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use twff_log::{EventType, Session};
use twff_schema::{Validator, Violation};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Required entry holding the final document.
pub const CONTENT_ENTRY: &str = "content/document.xhtml";
/// Required entry holding the Session document.
pub const LOG_ENTRY: &str = "meta/process-log.json";
/// Optional chat transcript entry.
pub const CHAT_ENTRY: &str = "meta/chat-transcript.json";
/// Optional detached signature entry.
pub const SIGNATURES_ENTRY: &str = "META-INF/signatures.xml";
/// Optional embedded image prefix.
pub const IMAGES_PREFIX: &str = "content/images/";
/// Optional embedded asset prefix.
pub const ASSETS_PREFIX: &str = "content/assets/";

/// Structural container errors. All fatal: nothing partial is returned.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("missing required entry: {0}")]
    MissingRequiredEntry(&'static str),

    #[error("invalid JSON in {entry}: {source}")]
    InvalidJson {
        entry: String,
        source: serde_json::Error,
    },

    #[error("session failed schema validation with {} violation(s)", .0.len())]
    InvalidSession(Vec<Violation>),

    #[error("asset path outside the container layout: {0:?}")]
    InvalidAssetPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An optional archive entry: transcript, signatures, image, or other asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Full archive path, e.g. `content/images/figure-1.png`.
    pub path: String,
    pub data: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Asset {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Everything recovered from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    pub content: String,
    pub session: Session,
    pub assets: Vec<Asset>,
}

fn allowed_asset_path(path: &str) -> bool {
    let in_layout = path == CHAT_ENTRY
        || path == SIGNATURES_ENTRY
        || path.strip_prefix(IMAGES_PREFIX).is_some_and(|p| !p.is_empty())
        || path.strip_prefix(ASSETS_PREFIX).is_some_and(|p| !p.is_empty());
    in_layout && !path.split('/').any(|segment| segment == "..")
}

/// Pack content, session, and optional assets into container bytes.
///
/// The session is schema-validated first; a structurally invalid log is
/// refused rather than sealed into an archive.
pub fn pack(
    content: &str,
    session: &Session,
    assets: &[Asset],
) -> Result<Vec<u8>, ContainerError> {
    let violations = Validator::new().validate_session(session);
    if !violations.is_empty() {
        return Err(ContainerError::InvalidSession(violations));
    }
    for asset in assets {
        if !allowed_asset_path(&asset.path) {
            return Err(ContainerError::InvalidAssetPath(asset.path.clone()));
        }
    }

    let log_json = serde_json::to_string_pretty(session).map_err(|source| {
        ContainerError::InvalidJson {
            entry: LOG_ENTRY.to_string(),
            source,
        }
    })?;

    // Fixed order and a fixed (DOS epoch) timestamp keep the output stable
    // across repeated packs of the same inputs.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut ordered: Vec<&Asset> = assets
        .iter()
        .filter(|a| a.path != SIGNATURES_ENTRY)
        .collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));
    let signatures = assets.iter().find(|a| a.path == SIGNATURES_ENTRY);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    write_entry(&mut writer, CONTENT_ENTRY, content.as_bytes(), &options)?;
    for asset in ordered {
        write_entry(&mut writer, &asset.path, &asset.data, &options)?;
    }
    write_entry(&mut writer, LOG_ENTRY, log_json.as_bytes(), &options)?;
    if let Some(asset) = signatures {
        write_entry(&mut writer, &asset.path, &asset.data, &options)?;
    }

    let cursor = writer
        .finish()
        .map_err(|err| ContainerError::MalformedArchive(err.to_string()))?;
    Ok(cursor.into_inner())
}

fn write_entry(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    path: &str,
    data: &[u8],
    options: &SimpleFileOptions,
) -> Result<(), ContainerError> {
    writer
        .start_file(path, options.clone())
        .map_err(|err| ContainerError::MalformedArchive(err.to_string()))?;
    writer.write_all(data)?;
    Ok(())
}

/// Unpack container bytes into content, session, and assets.
///
/// Chain verification is deliberately NOT performed here; callers invoke it
/// explicitly so that inspection of a tampered container is still possible.
pub fn unpack(bytes: &[u8]) -> Result<Unpacked, ContainerError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ContainerError::MalformedArchive(err.to_string()))?;

    let content = read_required(&mut archive, CONTENT_ENTRY)?;
    let log_json = read_required(&mut archive, LOG_ENTRY)?;
    let session: Session =
        serde_json::from_str(&log_json).map_err(|source| ContainerError::InvalidJson {
            entry: LOG_ENTRY.to_string(),
            source,
        })?;

    let mut assets = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|err| ContainerError::MalformedArchive(err.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        if path == CONTENT_ENTRY || path == LOG_ENTRY {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        assets.push(Asset { path, data });
    }

    Ok(Unpacked {
        content,
        session,
        assets,
    })
}

fn read_required(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    entry: &'static str,
) -> Result<String, ContainerError> {
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ContainerError::MissingRequiredEntry(entry))
        }
        Err(err) => return Err(ContainerError::MalformedArchive(err.to_string())),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(text)
}

/// Best-effort check of event position offsets against the content entry.
///
/// Offsets are character positions. Content may legitimately have moved past
/// a recorded span in later edits, so violations here are advisory and never
/// fatal.
pub fn check_offsets(content: &str, session: &Session) -> Vec<Violation> {
    let content_len = content.chars().count() as u64;
    let mut violations = Vec::new();

    for (i, event) in session.events.iter().enumerate() {
        let field = |name: &str| event.meta.get(name).map(|v| (v.as_u64(), v.clone()));

        let start = field("position_start");
        let end = field("position_end");

        let start_val = check_offset_field(&mut violations, i, "position_start", start, content_len);
        let end_val = check_offset_field(&mut violations, i, "position_end", end, content_len);
        if let (Some(start), Some(end)) = (start_val, end_val) {
            if start > end {
                violations.push(Violation::new(
                    format!("events[{i}].meta.position_start"),
                    format!("span start {start} is past span end {end}"),
                ));
            }
        }

        if event.event_type == EventType::Checkpoint {
            let position = field("position");
            check_offset_field(&mut violations, i, "position", position, content_len);
        }
    }

    violations
}

fn check_offset_field(
    violations: &mut Vec<Violation>,
    index: usize,
    name: &str,
    field: Option<(Option<u64>, Value)>,
    content_len: u64,
) -> Option<u64> {
    let (parsed, raw) = field?;
    match parsed {
        None => {
            violations.push(Violation::new(
                format!("events[{index}].meta.{name}"),
                format!("offset {raw} is not a non-negative integer"),
            ));
            None
        }
        Some(value) if value > content_len => {
            violations.push(Violation::new(
                format!("events[{index}].meta.{name}"),
                format!("offset {value} exceeds content length {content_len}"),
            ));
            Some(value)
        }
        Some(value) => Some(value),
    }
}
