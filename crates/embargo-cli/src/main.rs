//! # embargo CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use embargo_cli::check::{run_check, CheckArgs};
use embargo_cli::country::{run_country, CountryArgs};
use embargo_cli::history::{run_history, HistoryArgs};
use embargo_cli::{require_policy, verbosity_level};
use embargo_cli::validate::{run_validate, ValidateArgs};

/// Course embargo policy tool.
///
/// Loads a YAML policy into an in-process rule store and answers access
/// questions against it.
#[derive(Parser, Debug)]
#[command(name = "embargo", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Ignored when `RUST_LOG` is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the policy file.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a requester may access a course.
    Check(CheckArgs),

    /// Show the rule history of a course.
    History(HistoryArgs),

    /// Look up a country code.
    Country(CountryArgs),

    /// Load a policy file and summarize it.
    Validate(ValidateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_level(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let policy = cli.policy.as_deref();
    let result = match &cli.command {
        Commands::Country(args) => run_country(args),
        Commands::Check(args) => require_policy(policy).and_then(|p| run_check(args, &p)),
        Commands::History(args) => require_policy(policy).and_then(|p| run_history(args, &p)),
        Commands::Validate(args) => require_policy(policy).and_then(|p| run_validate(args, &p)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
