//! # History Subcommand
//!
//! Prints the rule history of a course as JSON, optionally re-checking its
//! digest chain.

use anyhow::{Context, Result};
use clap::Args;
use embargo_core::CourseKey;

use crate::policy::LoadedPolicy;

/// Arguments for the `embargo history` subcommand.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Course key.
    #[arg(long)]
    pub course: CourseKey,

    /// Print every entry instead of only the latest.
    #[arg(long)]
    pub all: bool,

    /// Verify the digest chain; exit 1 if it is broken.
    #[arg(long)]
    pub verify: bool,
}

/// Execute the history subcommand.
pub fn run_history(args: &HistoryArgs, policy: &LoadedPolicy) -> Result<u8> {
    let service = &policy.service;
    let course = &args.course;

    if args.all {
        let entries = service
            .history(course)
            .with_context(|| format!("failed to read history of {course}"))?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        match service
            .latest_history(course)
            .with_context(|| format!("failed to read history of {course}"))?
        {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => println!("No history for {course}"),
        }
    }

    if args.verify {
        let check = service.verify_history(course)?;
        println!(
            "Chain: {} entries, {} broken links, {} tampered -> {}",
            check.total_entries,
            check.broken_links,
            check.tampered_entries,
            if check.chain_valid { "OK" } else { "BROKEN" }
        );
        if !check.chain_valid {
            return Ok(1);
        }
    }

    Ok(0)
}
