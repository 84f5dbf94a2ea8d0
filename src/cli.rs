use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};

use crate::apify::ApifyClient;
use crate::lookup::{self, LookupError};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "igfollow",
    version,
    about = "Fetch an Instagram follower count via the Apify instagram-scraper actor",
    long_about = None
)]
pub struct Args {
    /// Instagram username to look up
    #[arg(value_name = "USERNAME")]
    pub username: String,

    /// Maximum seconds to wait for the remote run to finish
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,

    /// Verbose logging
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

/// Runs the CLI application.
///
/// # Errors
/// Returns an error on any failure of the lookup; the caller turns it into
/// the process exit code.
pub fn run() -> Result<(), LookupError> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err)
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            err.exit()
        }
        Err(_) => {
            // Fixed usage line on stderr; checked before any other logic.
            eprintln!("Usage: igfollow <username>");
            std::process::exit(1);
        }
    };

    let token = match std::env::var("APIFY_TOKEN") {
        Ok(t) if !t.is_empty() => t,
        _ => return Err(LookupError::MissingToken),
    };

    if args.verbose > 0 {
        eprintln!(
            "Looking up followers for {} via actor {}",
            args.username,
            lookup::INSTAGRAM_SCRAPER_ACTOR
        );
    }

    let client = ApifyClient::new(token, Duration::from_secs(args.timeout), args.verbose > 0);
    let count = lookup::lookup(&client, &args.username)?;

    // stdout carries the bare integer and nothing else
    println!("{count}");
    Ok(())
}
