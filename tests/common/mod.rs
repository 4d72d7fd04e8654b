//! Shared test utilities for integration and E2E tests.
//!
//! The fixtures here build real git repositories in temporary directories:
//! a bare `origin` plus any number of clones of it. Tests that need git
//! should call [`git_available`] first and return early when it is missing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     if !git_available() {
//!         return;
//!     }
//!     let fixture = GitFixture::new();
//!     let api = fixture.clone_repo("api");
//!     // ... test code
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::prelude::*;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::git_available;
    pub use super::GitFixture;
}

/// Whether a usable `git` is on `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed in {}: {}",
        args.join(" "),
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare `origin` with one commit on `main`, plus a seed clone used to push
/// new branches and commits to it.
pub struct GitFixture {
    temp_dir: assert_fs::TempDir,
    origin: PathBuf,
    seed: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let origin = temp_dir.path().join("origin.git");
        let seed = temp_dir.path().join("seed");

        git(temp_dir.path(), &["init", "--bare", "--initial-branch=main", "origin.git"]);
        git(temp_dir.path(), &["clone", "--quiet", "origin.git", "seed"]);
        configure_identity(&seed);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(seed.join("README.md"), "hello\n").expect("Failed to write README");
        git(&seed, &["add", "README.md"]);
        git(&seed, &["commit", "--quiet", "-m", "initial"]);
        git(&seed, &["push", "--quiet", "origin", "main"]);

        Self {
            temp_dir,
            origin,
            seed,
        }
    }

    /// Directory that holds all working copies created by [`clone_repo`](Self::clone_repo).
    pub fn workspace(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("work");
        std::fs::create_dir_all(&dir).expect("Failed to create workspace");
        dir
    }

    /// Clone origin into `work/<name>`, checked out on `main`.
    pub fn clone_repo(&self, name: &str) -> PathBuf {
        let work = self.workspace();
        git(
            &work,
            &["clone", "--quiet", self.origin.to_str().expect("utf-8 path"), name],
        );
        let path = work.join(name);
        configure_identity(&path);
        path
    }

    /// Create `branch` on origin with one extra commit touching `file`.
    pub fn push_branch(&self, branch: &str, file: &str, content: &str) {
        git(&self.seed, &["checkout", "--quiet", "-B", branch, "main"]);
        std::fs::write(self.seed.join(file), content).expect("Failed to write file");
        git(&self.seed, &["add", file]);
        git(&self.seed, &["commit", "--quiet", "-m", &format!("{} on {}", file, branch)]);
        git(&self.seed, &["push", "--quiet", "--force", "origin", branch]);
        git(&self.seed, &["checkout", "--quiet", "main"]);
    }

    /// Write a `.branch-sync.yaml` at the fixture root.
    #[allow(dead_code)]
    pub fn with_config(&self, content: &str) -> PathBuf {
        let child = self.temp_dir.child(".branch-sync.yaml");
        child.write_str(content).expect("Failed to write config file");
        child.path().to_path_buf()
    }

    /// Root of the fixture, usable as `XDG_CONFIG_HOME` to hide user config.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for GitFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_identity(repo: &Path) {
    git(repo, &["config", "user.name", "Branch Sync Tests"]);
    git(repo, &["config", "user.email", "tests@example.com"]);
    git(repo, &["config", "commit.gpgsign", "false"]);
}

/// Current branch of a working copy.
#[allow(dead_code)]
pub fn current_branch(repo: &Path) -> String {
    git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Number of stash entries in a working copy.
#[allow(dead_code)]
pub fn stash_count(repo: &Path) -> usize {
    git(repo, &["stash", "list"]).lines().filter(|l| !l.is_empty()).count()
}
