//! `twff fix` — explicit, audit-breaking chain repair.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use twff_log::{repair_chain, Session};

use super::EXIT_OK;

#[derive(Debug, Args)]
pub struct FixArgs {
    /// Path to a bare process-log.json
    pub file: PathBuf,

    /// Write the repaired log here instead of overwriting the input
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: FixArgs) -> Result<u8> {
    let mut session = Session::load(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let report = repair_chain(&mut session).context("repair failed")?;

    let target = args.output.unwrap_or(args.file);
    session
        .save(&target)
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!(
        "{} rehashed {} event(s); head {}",
        "✓".green().bold(),
        report.events_rehashed,
        short_hash(&report.head_hash)
    );
    println!(
        "{} every hash was rewritten from genesis — the repaired log no longer attests to its original history",
        "⚠".yellow().bold()
    );
    println!("→ {}", target.display());

    Ok(EXIT_OK)
}

fn short_hash(hash: &str) -> &str {
    if hash.len() > 16 {
        &hash[..16]
    } else {
        hash
    }
}
