//! `twff verify` — schema + chain + offsets, one report, exit code 0/1/2.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use twff_container::SIGNATURES_ENTRY;
use twff_log::{verify_head, SignatureBlock};
use twff_verify::Report;

use super::{EXIT_OK, EXIT_VIOLATION};

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Path to a .twff container or a bare process-log.json
    pub file: PathBuf,

    /// Emit the report as JSON instead of the human summary
    #[arg(long)]
    pub json: bool,

    /// Strict schema mode: flag meta fields outside the defined set
    #[arg(long)]
    pub strict: bool,

    /// JSON file mapping signer ids to hex Ed25519 public keys;
    /// checks META-INF/signatures.xml in a container
    #[arg(long)]
    pub keys: Option<PathBuf>,
}

enum SignatureStatus {
    NotChecked,
    Missing,
    Valid(String),
    Failed(String),
}

pub fn run(args: VerifyArgs) -> Result<u8> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    // ZIP local-file header magic; anything else is treated as a bare log.
    let is_container = bytes.starts_with(b"PK");
    debug!(path = %args.file.display(), is_container, "verifying");
    let (report, signature) = if is_container {
        let unpacked = twff_container::unpack(&bytes)?;
        let report =
            twff_verify::verify_session(&unpacked.session, Some(&unpacked.content), args.strict);
        let signature = check_signature(&unpacked, args.keys.as_deref())?;
        (report, signature)
    } else {
        let text = String::from_utf8(bytes).context("log file is not UTF-8")?;
        let doc: Value = serde_json::from_str(&text).context("log file is not valid JSON")?;
        (
            twff_verify::verify_document(&doc, args.strict),
            SignatureStatus::NotChecked,
        )
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &signature);
    }

    let signature_failed = matches!(signature, SignatureStatus::Failed(_));
    if report.passed() && !signature_failed {
        Ok(EXIT_OK)
    } else {
        Ok(EXIT_VIOLATION)
    }
}

fn check_signature(
    unpacked: &twff_container::Unpacked,
    keys: Option<&std::path::Path>,
) -> Result<SignatureStatus> {
    let Some(keys_path) = keys else {
        return Ok(SignatureStatus::NotChecked);
    };

    let keys_json = fs::read_to_string(keys_path)
        .with_context(|| format!("failed to read keys file {}", keys_path.display()))?;
    let keys_map: HashMap<String, String> =
        serde_json::from_str(&keys_json).context("failed to parse keys JSON")?;

    let Some(asset) = unpacked.assets.iter().find(|a| a.path == SIGNATURES_ENTRY) else {
        return Ok(SignatureStatus::Missing);
    };
    let xml = std::str::from_utf8(&asset.data).context("signatures.xml is not UTF-8")?;
    let block = match SignatureBlock::from_xml(xml) {
        Ok(block) => block,
        Err(err) => return Ok(SignatureStatus::Failed(err.to_string())),
    };

    let Some(hex_key) = keys_map.get(&block.signer) else {
        return Ok(SignatureStatus::Failed(format!(
            "no public key provided for signer {:?}",
            block.signer
        )));
    };
    let key_bytes = hex::decode(hex_key)
        .with_context(|| format!("invalid hex key for {}", block.signer))?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("public key for {} must be 32 bytes", block.signer))?;

    match verify_head(&unpacked.session, &block, &key_array) {
        Ok(()) => Ok(SignatureStatus::Valid(block.signer)),
        Err(err) => Ok(SignatureStatus::Failed(err.to_string())),
    }
}

fn print_report(report: &Report, signature: &SignatureStatus) {
    if report.schema_valid {
        println!("{} schema: valid", "✓".green().bold());
    } else {
        println!("{} schema: violations found", "✗".red().bold());
    }
    if report.chain_intact {
        println!(
            "{} chain: intact ({} events)",
            "✓".green().bold(),
            report.event_count
        );
    } else {
        println!("{} chain: broken", "✗".red().bold());
    }

    for violation in &report.violations {
        println!("  - [{}] {}", violation.path.cyan(), violation.message);
    }

    match signature {
        SignatureStatus::NotChecked => {}
        SignatureStatus::Missing => {
            println!("{} no signatures entry in container", "⚠".yellow());
        }
        SignatureStatus::Valid(signer) => {
            println!("{} signature by {} verified", "✓".green().bold(), signer);
        }
        SignatureStatus::Failed(reason) => {
            println!("{} signature check failed: {reason}", "✗".red().bold());
        }
    }

    println!();
    let signature_failed = matches!(signature, SignatureStatus::Failed(_));
    if report.passed() && !signature_failed {
        println!("{}: {}", "Status".bold(), "PASS".green().bold());
    } else {
        println!("{}: {}", "Status".bold(), "FAIL".red().bold());
    }
}
