//! # embargo-cli — Command-Line Front End
//!
//! Provides the `embargo` command. Every command except `country` loads a
//! YAML policy file into a fresh in-process store first.
//!
//! ## Subcommands
//!
//! - `embargo check` — Verdict for one course access attempt.
//! - `embargo history` — Latest or full rule history of a course.
//! - `embargo country` — Country catalog lookup.
//! - `embargo validate` — Load a policy and summarize it.
//!
//! ```bash
//! embargo --policy policy.yaml check --course edx/DemoX/Demo_Course --ip 1.0.0.7
//! embargo --policy policy.yaml history --course edx/DemoX/Demo_Course --all --verify
//! embargo country nz
//! ```
//!
//! Logs go to stderr. `RUST_LOG` takes precedence over `-v`.

pub mod check;
pub mod country;
pub mod history;
pub mod policy;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use crate::policy::LoadedPolicy;

/// Load the policy named by `--policy`, failing if none was given.
pub fn require_policy(path: Option<&Path>) -> Result<LoadedPolicy> {
    let path = path.context("this command needs --policy <FILE>")?;
    LoadedPolicy::load(path)
}

/// Log level for a `-v` count.
pub fn verbosity_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
