//! `twff pack` — seal content + process log into a container.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use twff_container::{Asset, ASSETS_PREFIX, CHAT_ENTRY, SIGNATURES_ENTRY};
use twff_log::Session;

use super::EXIT_OK;

#[derive(Debug, Args)]
pub struct PackArgs {
    /// Final document (XHTML)
    #[arg(long)]
    pub content: PathBuf,

    /// Process log (process-log.json)
    #[arg(long)]
    pub log: PathBuf,

    /// Files to embed under content/assets/ (repeatable)
    #[arg(long = "asset")]
    pub assets: Vec<PathBuf>,

    /// Chat transcript JSON to embed
    #[arg(long)]
    pub chat: Option<PathBuf>,

    /// signatures.xml to embed
    #[arg(long)]
    pub signatures: Option<PathBuf>,

    /// Output container path
    #[arg(long, default_value = "document.twff")]
    pub output: PathBuf,
}

pub fn run(args: PackArgs) -> Result<u8> {
    let content = fs::read_to_string(&args.content)
        .with_context(|| format!("failed to read {}", args.content.display()))?;
    let session = Session::load(&args.log)
        .with_context(|| format!("failed to load {}", args.log.display()))?;

    let mut assets = Vec::new();
    for path in &args.assets {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("asset has no usable file name: {}", path.display()))?;
        let data = fs::read(path)
            .with_context(|| format!("failed to read asset {}", path.display()))?;
        assets.push(Asset::new(format!("{ASSETS_PREFIX}{name}"), data));
    }
    if let Some(chat) = &args.chat {
        let data = fs::read(chat)
            .with_context(|| format!("failed to read transcript {}", chat.display()))?;
        assets.push(Asset::new(CHAT_ENTRY, data));
    }
    if let Some(signatures) = &args.signatures {
        let data = fs::read(signatures)
            .with_context(|| format!("failed to read {}", signatures.display()))?;
        assets.push(Asset::new(SIGNATURES_ENTRY, data));
    }

    let bytes = twff_container::pack(&content, &session, &assets)?;
    fs::write(&args.output, &bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!(
        "{} packed {} event(s) and {} asset(s) into {} ({} bytes)",
        "✓".green().bold(),
        session.len(),
        assets.len(),
        args.output.display(),
        bytes.len()
    );

    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twff_log::Event;

    #[test]
    fn test_pack_then_verify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let content_path = dir.path().join("document.xhtml");
        let log_path = dir.path().join("process-log.json");
        let out_path = dir.path().join("document.twff");

        fs::write(&content_path, "<html><body><p>done</p></body></html>").unwrap();
        let mut session = Session::new("anon-test");
        session.start_time = "2026-08-07T10:00:00Z".to_string();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::session_end("2026-08-07T10:01:00Z").unwrap())
            .unwrap();
        session.save(&log_path).unwrap();

        let code = run(PackArgs {
            content: content_path,
            log: log_path,
            assets: vec![],
            chat: None,
            signatures: None,
            output: out_path.clone(),
        })
        .unwrap();
        assert_eq!(code, EXIT_OK);

        let bytes = fs::read(&out_path).unwrap();
        let report = twff_verify::verify_container(&bytes, false).unwrap();
        assert!(report.passed());
    }
}
