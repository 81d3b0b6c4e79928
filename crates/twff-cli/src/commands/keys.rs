//! `twff keygen` / `twff sign` — Ed25519 keys and head signatures.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use twff_log::{keygen, sign_head, Session};

use super::EXIT_OK;

#[derive(Debug, Args)]
pub struct KeygenArgs {
    /// Write the keypair JSON here (default: print to stdout)
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SignArgs {
    /// Path to a bare process-log.json
    pub file: PathBuf,

    /// Keypair JSON produced by `twff keygen`
    #[arg(long)]
    pub key: PathBuf,

    /// Signer identifier recorded in the signature (e.g. "author:anon-7f3a")
    #[arg(long)]
    pub signer: String,

    /// Write signatures.xml here (default: print to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run_keygen(args: KeygenArgs) -> Result<u8> {
    let (private_key, public_key) = keygen();

    let private_hex = hex::encode(private_key);
    let public_hex = hex::encode(public_key);

    if let Some(path) = args.output {
        let keypair = serde_json::json!({
            "private_key": private_hex,
            "public_key": public_hex,
        });
        let json = serde_json::to_string_pretty(&keypair)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write keypair to {}", path.display()))?;
        println!("{} keypair written to {}", "✓".green(), path.display());
    } else {
        println!("{}", "Generated Ed25519 Keypair".bold().underline());
        println!("{}: {}", "Private Key".bold().red(), private_hex);
        println!("{}: {}", "Public Key".bold().green(), public_hex);
        println!();
        println!("{}", "WARNING: keep the private key secret!".yellow().bold());
    }

    Ok(EXIT_OK)
}

pub fn run_sign(args: SignArgs) -> Result<u8> {
    let session = Session::load(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let keys_json = fs::read_to_string(&args.key)
        .with_context(|| format!("failed to read keypair {}", args.key.display()))?;
    let keypair: serde_json::Value =
        serde_json::from_str(&keys_json).context("failed to parse keypair JSON")?;
    let private_hex = keypair
        .get("private_key")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("keypair JSON has no \"private_key\" field"))?;
    let private_bytes = hex::decode(private_hex).context("private key is not valid hex")?;
    let private_key: [u8; 32] = private_bytes
        .try_into()
        .map_err(|_| anyhow!("private key must be 32 bytes"))?;

    let block = sign_head(&session, &private_key, &args.signer)
        .context("chain must verify before it can be signed")?;
    let xml = block.to_xml();

    if let Some(path) = args.output {
        fs::write(&path, &xml)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!(
            "{} signed head {} → {}",
            "✓".green().bold(),
            &block.head_hash[..16.min(block.head_hash.len())],
            path.display()
        );
    } else {
        print!("{xml}");
    }

    Ok(EXIT_OK)
}
