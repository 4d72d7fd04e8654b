//! # Status Command Implementation
//!
//! This module implements the `status` subcommand, a read-only report of
//! every discovered repository: current branch, position relative to its
//! upstream, whether the working tree is dirty, and how many stashes are
//! parked (including any left behind by a failed restore).
//!
//! Output is one line per repository, or a JSON array with `--format json`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};

use branch_sync::inspector::BranchInspector;
use branch_sync::loader::Loader;
use branch_sync::output::status_line;
use branch_sync::suggestions;

use super::Workspace;

/// Output formats for the status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum StatusFormat {
    /// One line per repository
    #[default]
    Text,
    /// JSON array of repositories
    Json,
}

/// Show the branch and upstream state of every repository
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Directories containing working copies (default: configured roots or
    /// the current directory).
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: StatusFormat,

    /// Git executable to run.
    #[arg(long, value_name = "PATH")]
    pub git: Option<PathBuf>,
}

/// Execute the `status` command.
pub fn execute(ws: &Workspace, args: StatusArgs) -> Result<ExitCode> {
    let runner = ws.runner(args.git.as_deref());
    let inspector = BranchInspector::new(&runner, ws.per_command_timeout());

    let snapshot = Loader::new().refresh(&ws.candidates(&args.paths), &inspector)?;
    if snapshot.is_empty() {
        return Err(suggestions::no_repositories_found(&ws.roots(&args.paths)));
    }

    match args.format {
        StatusFormat::Json => {
            println!("{}", serde_json::to_string_pretty(snapshot.as_slice())?);
        }
        StatusFormat::Text => {
            for repo in snapshot.iter() {
                println!("{}", status_line(&ws.output, repo));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
