//! `twff unpack` — extract a container into a directory.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use twff_container::{CONTENT_ENTRY, LOG_ENTRY};

use super::EXIT_OK;

#[derive(Debug, Args)]
pub struct UnpackArgs {
    /// Path to a .twff container
    pub file: PathBuf,

    /// Directory to extract into
    #[arg(long, default_value = ".")]
    pub output: PathBuf,
}

pub fn run(args: UnpackArgs) -> Result<u8> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let unpacked = twff_container::unpack(&bytes)?;

    write_entry(&args.output, CONTENT_ENTRY, unpacked.content.as_bytes())?;

    let log_json = serde_json::to_string_pretty(&unpacked.session)?;
    write_entry(&args.output, LOG_ENTRY, log_json.as_bytes())?;

    let mut skipped = 0usize;
    for asset in &unpacked.assets {
        // Never follow hostile entry names outside the output directory.
        if asset.path.starts_with('/') || asset.path.split('/').any(|s| s == "..") {
            eprintln!("{} skipping unsafe entry {:?}", "⚠".yellow(), asset.path);
            skipped += 1;
            continue;
        }
        write_entry(&args.output, &asset.path, &asset.data)?;
    }

    println!(
        "{} extracted {} entries into {}{}",
        "✓".green().bold(),
        2 + unpacked.assets.len() - skipped,
        args.output.display(),
        if skipped > 0 {
            format!(" ({skipped} skipped)")
        } else {
            String::new()
        }
    );

    Ok(EXIT_OK)
}

fn write_entry(root: &Path, entry: &str, data: &[u8]) -> Result<()> {
    let target = root.join(entry);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&target, data).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use twff_container::Asset;
    use twff_log::{Event, Session};

    #[test]
    fn test_unpack_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("document.twff");
        let out = dir.path().join("extracted");

        let mut session = Session::new("anon-test");
        session.start_time = "2026-08-07T10:00:00Z".to_string();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::session_end("2026-08-07T10:01:00Z").unwrap())
            .unwrap();

        let bytes = twff_container::pack(
            "<html><body/></html>",
            &session,
            &[Asset::new("content/images/fig-1.png", vec![7u8; 16])],
        )
        .unwrap();
        fs::write(&container, bytes).unwrap();

        let code = run(UnpackArgs {
            file: container,
            output: out.clone(),
        })
        .unwrap();
        assert_eq!(code, EXIT_OK);

        assert!(out.join(CONTENT_ENTRY).is_file());
        assert!(out.join(LOG_ENTRY).is_file());
        assert!(out.join("content/images/fig-1.png").is_file());

        let restored = Session::load(out.join(LOG_ENTRY)).unwrap();
        assert_eq!(restored, session);
    }
}
