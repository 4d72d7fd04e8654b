//! # Sync Command Implementation
//!
//! This module implements the `sync` subcommand, which switches every
//! discovered repository to the same branch.
//!
//! ## Functionality
//!
//! - **Discovery**: Repositories come from the given paths, the configured
//!   roots, or the current directory, in that order of preference.
//! - **Switching**: Each repository runs the full switch protocol, at most
//!   `--jobs` at a time. Local changes are stashed and restored unless
//!   `--discard` is given.
//! - **Reporting**: A progress bar tracks completion; one line per repository
//!   is printed as it finishes, with the transcript tail for failures (or the
//!   whole transcript with `--verbose`).
//!
//! The command exits non-zero when any repository failed to switch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use branch_sync::cache::BranchCache;
use branch_sync::config::{FetchFailurePolicy, SyncOptions};
use branch_sync::defaults;
use branch_sync::inspector::BranchInspector;
use branch_sync::output::{emoji, ProgressReporter};
use branch_sync::scheduler::{ProgressEvent, ProgressSink, SyncScheduler};
use branch_sync::suggestions;
use branch_sync::transaction::FailureKind;

use super::Workspace;

/// Switch every discovered repository to a branch
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Branch to switch to; defaults to `target_branch` from the config.
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Directories containing working copies (default: configured roots or
    /// the current directory).
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Throw away local changes instead of stashing and restoring them.
    #[arg(long)]
    pub discard: bool,

    /// Maximum number of repositories switched at the same time.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Seconds any single git command may run before it is killed.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fail a repository whose fetch fails instead of switching with
    /// possibly stale refs.
    #[arg(long)]
    pub abort_on_fetch_failure: bool,

    /// Git executable to run.
    #[arg(long, value_name = "PATH")]
    pub git: Option<PathBuf>,

    /// Only print failures and the final summary.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the full transcript of every repository.
    #[arg(short, long)]
    pub verbose: bool,
}

impl SyncArgs {
    /// Configured options with command-line overrides applied.
    fn options(&self, ws: &Workspace) -> Result<SyncOptions> {
        if self.branch.is_none() && ws.config.target_branch.is_none() {
            return Err(suggestions::missing_target_branch());
        }

        let mut options = ws.config.sync_options(self.branch.as_deref())?;
        if self.discard {
            options.preserve_local_changes = false;
        }
        if let Some(jobs) = self.jobs {
            options.max_parallel = jobs;
        }
        if let Some(secs) = self.timeout {
            options.per_command_timeout = Duration::from_secs(secs);
        }
        if self.abort_on_fetch_failure {
            options.fetch_failure_policy = FetchFailurePolicy::Abort;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Execute the `sync` command.
pub fn execute(ws: &Workspace, args: SyncArgs) -> Result<ExitCode> {
    let options = args.options(ws)?;
    let mut repositories = ws.discover(&args.paths)?;
    let runner = ws.runner(args.git.as_deref());

    if !args.quiet {
        println!(
            "{} Switching {} repositories to {}",
            emoji(&ws.output, "🔀", "[SYNC]"),
            repositories.len(),
            options.target_branch
        );
    }

    let reporter = ProgressReporter::new(repositories.len(), ws.output.clone(), args.quiet, args.verbose);
    let branch_missing = AtomicUsize::new(0);
    let sink = |event: &ProgressEvent<'_>| {
        if event.outcome.failure_kind() == Some(FailureKind::BranchNotFound) {
            branch_missing.fetch_add(1, Ordering::SeqCst);
        }
        if !args.quiet || !event.outcome.success {
            reporter.on_progress(event);
        }
    };

    let cache = BranchCache::new(defaults::BRANCH_CACHE_TTL);
    let summary = SyncScheduler::new(&runner)
        .with_cache(&cache)
        .run(&mut repositories, &options, &sink);
    reporter.finish();
    let summary = summary?;

    if summary.total > 0 && branch_missing.load(Ordering::SeqCst) == summary.total {
        let inspector = BranchInspector::new(&runner, options.per_command_timeout).with_cache(&cache);
        let known = inspector.branches_across(&repositories);
        return Err(suggestions::branch_not_found_anywhere(&options.target_branch, &known));
    }

    let marker = if summary.all_succeeded() {
        emoji(&ws.output, "✅", "[OK]")
    } else {
        emoji(&ws.output, "⚠️", "[WARN]")
    };
    println!(
        "{} {} of {} repositories on {} ({} failed) in {:.1}s",
        marker,
        summary.succeeded,
        summary.total,
        options.target_branch,
        summary.failed,
        summary.elapsed.as_secs_f64()
    );

    if summary.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
