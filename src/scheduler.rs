//! # Sync Scheduler
//!
//! The scheduler fans switch transactions out over many repositories:
//!
//! - Work runs on a dedicated rayon pool with `max_parallel` threads, and
//!   every task takes a [`Gate`] permit before touching its repository, so
//!   no more than `max_parallel` transactions are ever in flight.
//! - Each task gets exclusive `&mut` access to its [`Repository`]. Duplicate
//!   roots are rejected up front, comparing canonical paths so a symlinked
//!   alias counts too, and one working copy never sees two transactions in
//!   the same run.
//! - A panic inside a task is caught at the task boundary and turned into a
//!   failed [`SwitchOutcome`]. One misbehaving repository never stops the
//!   others.
//! - A [`ProgressEvent`] is emitted as each repository finishes, carrying a
//!   1-based completion index from an atomic counter. Events arrive in
//!   completion order, not input order.

use std::any::Any;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;

use crate::cache::BranchCache;
use crate::config::SyncOptions;
use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::inspector::BranchInspector;
use crate::process::ProcessRunner;
use crate::repository::Repository;
use crate::transaction::{SwitchOutcome, SwitchTransaction};

/// Emitted once per completed repository.
#[derive(Debug)]
pub struct ProgressEvent<'a> {
    pub repository: &'a Repository,
    pub outcome: &'a SwitchOutcome,
    /// 1-based position in completion order.
    pub index: usize,
    pub total: usize,
}

/// Receives progress events, possibly from several threads at once.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub struct SyncScheduler<'a> {
    runner: &'a dyn ProcessRunner,
    cache: Option<&'a BranchCache>,
}

impl<'a> SyncScheduler<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self {
            runner,
            cache: None,
        }
    }

    /// Invalidate entries in `cache` for every repository that was switched.
    pub fn with_cache(mut self, cache: &'a BranchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Switch every repository to `options.target_branch`.
    ///
    /// Returns an error only for problems that prevent the run from starting;
    /// per-repository failures are reported through `sink` and counted in the
    /// summary.
    pub fn run(
        &self,
        repositories: &mut [Repository],
        options: &SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary> {
        options.validate()?;
        reject_duplicates(repositories)?;

        let started = Instant::now();
        let total = repositories.len();
        let gate = Gate::new(options.max_parallel);
        let completed = AtomicUsize::new(0);
        let succeeded = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_parallel)
            .thread_name(|i| format!("branch-sync-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool {
                message: e.to_string(),
            })?;

        info!(
            "switching {} repositories to {} ({} at a time)",
            total, options.target_branch, options.max_parallel
        );

        pool.install(|| {
            repositories.par_iter_mut().for_each(|repo| {
                let _permit = gate.acquire();
                let outcome = self.switch_one(repo, options);

                if outcome.success {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                let index = completed.fetch_add(1, Ordering::SeqCst) + 1;
                sink.on_progress(&ProgressEvent {
                    repository: repo,
                    outcome: &outcome,
                    index,
                    total,
                });
            });
        });

        let succeeded = succeeded.into_inner();
        let summary = RunSummary {
            elapsed: started.elapsed(),
            total,
            succeeded,
            failed: total - succeeded,
        };
        info!(
            "{} of {} repositories switched in {:.2}s",
            summary.succeeded,
            summary.total,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Run one transaction and refresh the repository, containing panics.
    fn switch_one(&self, repo: &mut Repository, options: &SyncOptions) -> SwitchOutcome {
        let started = Instant::now();
        let transaction = SwitchTransaction::new(self.runner, options);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| transaction.execute(repo.root())))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!("{}: task fault: {}", repo.name, message);
                SwitchOutcome::from_fault(format!("unexpected fault: {}", message), started.elapsed())
            });
        repo.record_outcome(&outcome);

        if let Some(cache) = self.cache {
            if let Err(e) = cache.invalidate(&repo.root().to_path_buf()) {
                warn!("{}: {}", repo.name, e);
            }
        }

        let inspector = BranchInspector::new(self.runner, options.per_command_timeout);
        match panic::catch_unwind(AssertUnwindSafe(|| inspector.refresh(repo))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{}: could not refresh after switch: {}", repo.name, e),
            Err(payload) => warn!(
                "{}: fault while refreshing: {}",
                repo.name,
                panic_message(payload.as_ref())
            ),
        }

        outcome
    }
}

fn reject_duplicates(repositories: &[Repository]) -> Result<()> {
    let mut seen = HashSet::new();
    for repo in repositories {
        // Roots that do not exist (yet) are compared as given
        let root = fs::canonicalize(repo.root()).unwrap_or_else(|_| repo.root().to_path_buf());
        if !seen.insert(root) {
            return Err(Error::DuplicateRepository {
                path: repo.root().display().to_string(),
            });
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
