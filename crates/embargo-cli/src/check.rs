//! # Check Subcommand
//!
//! Evaluates one access attempt against the loaded policy and prints the
//! verdict as JSON.

use std::net::IpAddr;

use anyhow::{Context, Result};
use clap::Args;
use embargo_core::{CountryCode, CourseKey};
use embargo_engine::{check_course_access, AccessRequest};

use crate::policy::LoadedPolicy;

/// Arguments for the `embargo check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Course key, e.g. `edx/DemoX/Demo_Course`.
    #[arg(long)]
    pub course: CourseKey,

    /// Requester country, overriding geo-IP resolution.
    #[arg(long)]
    pub country: Option<CountryCode>,

    /// Requester IP address.
    #[arg(long)]
    pub ip: Option<IpAddr>,

    /// Country on the requester's profile.
    #[arg(long)]
    pub profile_country: Option<CountryCode>,
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 if allowed, 2 if denied.
pub fn run_check(args: &CheckArgs, policy: &LoadedPolicy) -> Result<u8> {
    let request = AccessRequest {
        course: args.course.clone(),
        ip: args.ip,
        country: args.country.clone(),
        profile_country: args.profile_country.clone(),
    };
    let verdict = check_course_access(&policy.service, &policy.resolver, &request)
        .context("access check failed")?;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(if verdict.is_allowed() { 0 } else { 2 })
}
