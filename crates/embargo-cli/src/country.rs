//! # Country Subcommand
//!
//! Looks a code up in the country catalog.

use anyhow::Result;
use clap::Args;
use embargo_core::Country;

/// Arguments for the `embargo country` subcommand.
#[derive(Args, Debug)]
pub struct CountryArgs {
    /// ISO 3166-1 alpha-2 code, any case.
    #[arg(value_name = "CODE")]
    pub code: String,
}

/// Execute the country subcommand. Returns 1 for an unknown code.
pub fn run_country(args: &CountryArgs) -> Result<u8> {
    match Country::new(&args.code) {
        Ok(country) => {
            println!("{country}");
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}
