//! Binary crate for the `agro` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and prompting for missing farm parameters
//! - Interactive backend configuration
//! - Human-friendly forecast and advice output

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod output;
mod prompts;

fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cmd.verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    cmd.run().await
}
