//! # Branches Command Implementation
//!
//! Lists the union of local branches and `origin` tracking branches across
//! all discovered repositories, one per line. `--filter` narrows the list to
//! names containing every whitespace-separated word of the query, ignoring
//! case.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use branch_sync::cache::BranchCache;
use branch_sync::defaults;
use branch_sync::inspector::{filter_branches, BranchInspector};

use super::Workspace;

/// List the branches known across repositories
#[derive(Args, Debug)]
pub struct BranchesArgs {
    /// Directories containing working copies (default: configured roots or
    /// the current directory).
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Only show branches matching every word of this query.
    #[arg(short, long, value_name = "QUERY")]
    pub filter: Option<String>,

    /// Git executable to run.
    #[arg(long, value_name = "PATH")]
    pub git: Option<PathBuf>,
}

/// Execute the `branches` command.
pub fn execute(ws: &Workspace, args: BranchesArgs) -> Result<ExitCode> {
    let repositories = ws.discover(&args.paths)?;
    let runner = ws.runner(args.git.as_deref());
    let cache = BranchCache::new(defaults::BRANCH_CACHE_TTL);
    let inspector = BranchInspector::new(&runner, ws.per_command_timeout()).with_cache(&cache);

    let branches = inspector.branches_across(&repositories);
    let query = args.filter.as_deref().unwrap_or("");
    for name in filter_branches(&branches, query) {
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}
