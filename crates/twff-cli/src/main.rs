use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use twff_cli::commands::{self, EXIT_STRUCTURAL};

/// Inspect, verify, repair, and package TWFF writing sessions.
#[derive(Parser, Debug)]
#[command(name = "twff", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a container or bare process log and print a report
    Verify(commands::verify::VerifyArgs),
    /// Recompute every event hash from genesis (audit-breaking)
    Fix(commands::fix::FixArgs),
    /// Display a process log in human-readable form
    Log(commands::log::LogArgs),
    /// Pack content + process log (+ assets) into a .twff container
    Pack(commands::pack::PackArgs),
    /// Extract a .twff container into a directory
    Unpack(commands::unpack::UnpackArgs),
    /// Generate a new Ed25519 keypair
    Keygen(commands::keys::KeygenArgs),
    /// Sign a process log's chain head
    Sign(commands::keys::SignArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Verify(args) => commands::verify::run(args),
        Commands::Fix(args) => commands::fix::run(args),
        Commands::Log(args) => commands::log::run(args),
        Commands::Pack(args) => commands::pack::run(args),
        Commands::Unpack(args) => commands::unpack::run(args),
        Commands::Keygen(args) => commands::keys::run_keygen(args),
        Commands::Sign(args) => commands::keys::run_sign(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(EXIT_STRUCTURAL)
        }
    }
}
