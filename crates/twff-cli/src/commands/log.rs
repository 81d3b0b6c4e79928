//! `twff log` — human-readable chain listing.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use twff_log::Session;

use super::EXIT_OK;

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Path to a .twff container or a bare process-log.json
    pub file: PathBuf,
}

pub fn run(args: LogArgs) -> Result<u8> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let session: Session = if bytes.starts_with(b"PK") {
        twff_container::unpack(&bytes)?.session
    } else {
        let text = String::from_utf8(bytes).context("log file is not UTF-8")?;
        serde_json::from_str(&text).context("log file is not a session document")?
    };

    println!("{}", "Process Log".bold().underline());
    println!("{}: {}", "File".bold(), args.file.display());
    println!("{}: {}", "Session".bold(), session.session_id);
    println!("{}: {}", "User".bold(), session.user_id);
    println!("{}: {}", "Started".bold(), session.start_time);
    match &session.end_time {
        Some(end) => println!("{}: {}", "Ended".bold(), end),
        None => println!("{}: {}", "Ended".bold(), "still open".yellow()),
    }
    println!("{}: {}", "Events".bold(), session.len());
    if let Some(head) = session.head_hash() {
        println!("{}: {}", "Head".bold(), head);
    }
    println!();

    for (index, event) in session.events.iter().enumerate() {
        println!(
            "{} {} {} @ {}",
            "Event".bold().cyan(),
            index.to_string().cyan(),
            event.event_type.as_str().bold(),
            event.timestamp
        );
        for (key, value) in &event.meta {
            println!("  {key}: {value}");
        }
        match &event.hash {
            Some(hash) if hash.len() > 16 => println!("  {}: {}…", "hash".bold(), &hash[..16]),
            Some(hash) => println!("  {}: {hash}", "hash".bold()),
            None => println!("  {}: {}", "hash".bold(), "none".yellow()),
        }
        println!();
    }

    Ok(EXIT_OK)
}
