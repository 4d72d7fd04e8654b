//! # Branch Inspection
//!
//! Read-only queries against a working copy: which branch is checked out,
//! which branches exist, how far the current branch is from its upstream,
//! whether the tree has local changes, and how many stashes are parked.
//!
//! All queries go through a [`ProcessRunner`], so they run under the same
//! timeout and non-interactive environment as the switch protocol itself.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use rayon::prelude::*;

use crate::cache::BranchCache;
use crate::error::{Error, Result};
use crate::process::{CommandOutput, ProcessRunner};
use crate::repository::{Repository, SyncCounts, UpstreamStatus};

/// Remote whose tracking branches are considered.
pub const REMOTE: &str = "origin";

/// Label returned when nothing at all can be said about HEAD.
pub const UNKNOWN_BRANCH: &str = "(unknown)";

/// Freshly queried state of one working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub branch: String,
    pub dirty: bool,
    pub upstream: UpstreamStatus,
    pub stash_count: usize,
}

/// Runs the read-only git queries.
pub struct BranchInspector<'a> {
    runner: &'a dyn ProcessRunner,
    timeout: Duration,
    cache: Option<&'a BranchCache>,
}

impl<'a> BranchInspector<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            cache: None,
        }
    }

    /// Memoise [`all_branches`](Self::all_branches) in `cache`.
    pub fn with_cache(mut self, cache: &'a BranchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn git(&self, root: &Path, args: &[&str]) -> CommandOutput {
        self.runner.run(root, args, self.timeout)
    }

    fn git_checked(&self, root: &Path, args: &[&str]) -> Result<CommandOutput> {
        let output = self.git(root, args);
        if output.success() {
            Ok(output)
        } else {
            Err(Error::GitCommand {
                command: args.join(" "),
                path: root.display().to_string(),
                stderr: output.tail(3),
            })
        }
    }

    /// Name of the checked-out branch, or a detached-state label.
    ///
    /// Tries `branch --show-current`, then `symbolic-ref`, then a short
    /// commit id. Never fails; `"(unknown)"` is the last resort.
    pub fn current_branch(&self, root: &Path) -> String {
        let shown = self.git(root, &["branch", "--show-current"]);
        if shown.success() && !shown.text().is_empty() {
            return shown.text().to_string();
        }

        let symbolic = self.git(root, &["symbolic-ref", "--short", "-q", "HEAD"]);
        if symbolic.success() && !symbolic.text().is_empty() && symbolic.text() != "HEAD" {
            return symbolic.text().to_string();
        }

        let commit = self.git(root, &["rev-parse", "--short", "HEAD"]);
        if commit.success() && !commit.text().is_empty() {
            return format!("(detached at {})", commit.text());
        }

        debug!("could not determine HEAD in {}", root.display());
        UNKNOWN_BRANCH.to_string()
    }

    /// Local branch names plus `origin/*` names with the prefix stripped,
    /// de-duplicated case-insensitively.
    pub fn all_branches(&self, root: &Path) -> Result<Vec<String>> {
        match self.cache {
            Some(cache) => cache.get_or_compute(root.to_path_buf(), || self.query_branches(root)),
            None => self.query_branches(root),
        }
    }

    fn query_branches(&self, root: &Path) -> Result<Vec<String>> {
        let local = self.git_checked(
            root,
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
        )?;
        let remote_ref = format!("refs/remotes/{}", REMOTE);
        let remote = self.git_checked(
            root,
            &["for-each-ref", "--format=%(refname:short)", &remote_ref],
        )?;
        Ok(merge_branch_lists(&local.stdout, &remote.stdout))
    }

    /// Union of branch names across many repositories.
    ///
    /// Repositories whose listing fails are skipped with a warning.
    pub fn branches_across(&self, repositories: &[Repository]) -> Vec<String> {
        let listings: Vec<Vec<String>> = repositories
            .par_iter()
            .filter_map(|repo| match self.all_branches(repo.root()) {
                Ok(branches) => Some(branches),
                Err(e) => {
                    warn!("skipping branches of {}: {}", repo.name, e);
                    None
                }
            })
            .collect();

        let mut seen = HashSet::new();
        let mut all: Vec<String> = listings
            .into_iter()
            .flatten()
            .filter(|name| name != REMOTE)
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect();
        all.sort_by_key(|name| name.to_lowercase());
        all
    }

    /// Ahead/behind counts of HEAD against its upstream.
    pub fn sync_counts(&self, root: &Path) -> Result<UpstreamStatus> {
        let upstream = self.git(
            root,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        );
        if !upstream.success() || upstream.text().is_empty() {
            return Ok(UpstreamStatus::NoUpstream);
        }

        let counts = self.git_checked(root, &["rev-list", "--left-right", "--count", "HEAD...@{u}"])?;
        parse_left_right(counts.text())
            .map(UpstreamStatus::Tracking)
            .ok_or_else(|| Error::GitCommand {
                command: "rev-list --left-right --count HEAD...@{u}".to_string(),
                path: root.display().to_string(),
                stderr: format!("unexpected output '{}'", counts.text()),
            })
    }

    /// Whether the tree has modified, staged or untracked entries.
    pub fn is_dirty(&self, root: &Path) -> Result<bool> {
        let status = self.git_checked(root, &["status", "--porcelain", "--untracked-files=all"])?;
        Ok(status.stdout.lines().any(|line| !line.trim().is_empty()))
    }

    pub fn stash_count(&self, root: &Path) -> Result<usize> {
        let list = self.git_checked(root, &["stash", "list"])?;
        Ok(list.stdout.lines().filter(|l| !l.trim().is_empty()).count())
    }

    pub fn has_local_branch(&self, root: &Path, branch: &str) -> bool {
        let reference = format!("refs/heads/{}", branch);
        self.git(root, &["show-ref", "--verify", "--quiet", &reference])
            .success()
    }

    pub fn has_remote_branch(&self, root: &Path, branch: &str) -> bool {
        let reference = format!("refs/remotes/{}/{}", REMOTE, branch);
        self.git(root, &["show-ref", "--verify", "--quiet", &reference])
            .success()
    }

    /// Query everything shown for a repository.
    pub fn inspect(&self, root: &Path) -> Result<Inspection> {
        Ok(Inspection {
            branch: self.current_branch(root),
            dirty: self.is_dirty(root)?,
            upstream: self.sync_counts(root)?,
            stash_count: self.stash_count(root)?,
        })
    }

    /// Inspect `repo` and store the result in it.
    pub fn refresh(&self, repo: &mut Repository) -> Result<()> {
        let inspection = self.inspect(repo.root())?;
        repo.apply_inspection(inspection);
        Ok(())
    }
}

/// Merge `for-each-ref` listings of local and `origin` branches.
///
/// Remote names lose their `origin/` prefix; the symbolic `origin/HEAD`
/// (printed as `origin` by newer git) is dropped. The first spelling of a
/// name wins when two differ only in case.
pub fn merge_branch_lists(local: &str, remote: &str) -> Vec<String> {
    let prefix = format!("{}/", REMOTE);
    let remote_names = remote
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != REMOTE)
        .map(|name| name.strip_prefix(&prefix).unwrap_or(name));

    let mut seen = HashSet::new();
    let mut branches: Vec<String> = local
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .chain(remote_names)
        .filter(|name| *name != "HEAD")
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(str::to_string)
        .collect();
    branches.sort_by_key(|name| name.to_lowercase());
    branches
}

/// Parse `rev-list --left-right --count` output: `<ahead>\t<behind>`.
fn parse_left_right(text: &str) -> Option<SyncCounts> {
    let mut parts = text.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(SyncCounts { ahead, behind })
}

/// Filter branch names by a free-text query.
///
/// The query is split on whitespace; a name matches when every token is a
/// case-insensitive substring of it. An empty query matches everything.
pub fn filter_branches<'b>(branches: &'b [String], query: &str) -> Vec<&'b str> {
    let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    branches
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            tokens.iter().all(|token| lower.contains(token.as_str()))
        })
        .map(String::as_str)
        .collect()
}
