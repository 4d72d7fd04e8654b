//! # Branch Sync CLI
//!
//! This is the binary entry point for the `branch-sync` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Translating a failed run into a non-zero exit status.
//!
//! The core application logic lives in the `branch_sync` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    cli.execute()
}
