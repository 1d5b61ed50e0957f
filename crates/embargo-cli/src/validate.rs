//! # Validate Subcommand
//!
//! Loads and applies a policy file, then prints what it contained. Any
//! parse, validation, or constraint error fails the command.

use anyhow::Result;
use clap::Args;

use crate::policy::LoadedPolicy;

/// Arguments for the `embargo validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, policy: &LoadedPolicy) -> Result<u8> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&policy.summary)?);
    } else {
        println!("{}", policy.summary);
        println!("Policy OK");
    }
    Ok(0)
}
