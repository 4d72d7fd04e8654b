//! # Configuration
//!
//! Two layers of configuration live here:
//!
//! - **`SyncOptions`**: the knobs a single synchronization run needs (target
//!   branch, working-tree policy, concurrency bound, per-command timeout and
//!   the fetch-failure policy). It is what the transaction and scheduler
//!   consume.
//!
//! - **`Config`**: the optional `.branch-sync.yaml` file. It names the git
//!   executable, the discovery roots and suffixes, and defaults for every
//!   `SyncOptions` field. Command-line flags override it.
//!
//! ## Example
//!
//! ```yaml
//! git: /usr/bin/git
//! roots:
//!   - /home/me/work
//! suffixes: [".", "src"]
//! scan_children: true
//! target_branch: release/2.0
//! preserve_local_changes: true
//! max_parallel: 8
//! timeout_secs: 60
//! fetch_failure_policy: continue
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// What a transaction does when `git fetch` fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Record the failure and let branch resolution decide, using whatever
    /// remote refs are already known locally.
    #[default]
    Continue,
    /// Fail the transaction at the fetch step.
    Abort,
}

/// Options for one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub target_branch: String,
    /// Stash local changes and restore them afterwards, instead of
    /// discarding them.
    pub preserve_local_changes: bool,
    /// Maximum number of transactions executing at once.
    pub max_parallel: usize,
    /// Applied to every git invocation.
    pub per_command_timeout: Duration,
    pub fetch_failure_policy: FetchFailurePolicy,
}

impl SyncOptions {
    /// Options for `target_branch` with every other field at its default.
    pub fn new(target_branch: impl Into<String>) -> Self {
        Self {
            target_branch: target_branch.into(),
            preserve_local_changes: true,
            max_parallel: defaults::MAX_PARALLEL,
            per_command_timeout: defaults::PER_COMMAND_TIMEOUT,
            fetch_failure_policy: FetchFailurePolicy::default(),
        }
    }

    pub fn preserve_local_changes(mut self, preserve: bool) -> Self {
        self.preserve_local_changes = preserve;
        self
    }

    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn per_command_timeout(mut self, timeout: Duration) -> Self {
        self.per_command_timeout = timeout;
        self
    }

    pub fn fetch_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.fetch_failure_policy = policy;
        self
    }

    /// Check the constraints every run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.target_branch.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                field: "target_branch".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.target_branch.starts_with('-') {
            return Err(Error::ConfigInvalid {
                field: "target_branch".to_string(),
                message: format!("'{}' looks like an option, not a branch", self.target_branch),
            });
        }
        if self.max_parallel == 0 {
            return Err(Error::ConfigInvalid {
                field: "max_parallel".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.per_command_timeout.is_zero() {
            return Err(Error::ConfigInvalid {
                field: "per_command_timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// Contents of a `.branch-sync.yaml` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Git executable; `git` from `PATH` when unset.
    #[serde(default)]
    pub git: Option<PathBuf>,

    /// Parent directories searched for working copies.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Subdirectory suffixes tried under every root.
    #[serde(default = "defaults::suffixes")]
    pub suffixes: Vec<String>,

    /// Also treat each immediate child directory of a root as a candidate.
    #[serde(default = "default_true")]
    pub scan_children: bool,

    #[serde(default)]
    pub target_branch: Option<String>,

    #[serde(default)]
    pub preserve_local_changes: Option<bool>,

    #[serde(default)]
    pub max_parallel: Option<usize>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub fetch_failure_policy: Option<FetchFailurePolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git: None,
            roots: Vec::new(),
            suffixes: defaults::suffixes(),
            scan_children: true,
            target_branch: None,
            preserve_local_changes: None,
            max_parallel: None,
            timeout_secs: None,
            fetch_failure_policy: None,
        }
    }
}

impl Config {
    /// The git executable to run.
    pub fn git_program(&self) -> PathBuf {
        self.git
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::GIT_PROGRAM))
    }

    /// Build run options, preferring `target` over the configured branch.
    ///
    /// The result is validated.
    pub fn sync_options(&self, target: Option<&str>) -> Result<SyncOptions> {
        let branch = target
            .map(str::to_string)
            .or_else(|| self.target_branch.clone())
            .ok_or_else(|| Error::ConfigInvalid {
                field: "target_branch".to_string(),
                message: "no target branch given".to_string(),
            })?;

        let mut options = SyncOptions::new(branch);
        if let Some(preserve) = self.preserve_local_changes {
            options.preserve_local_changes = preserve;
        }
        if let Some(max_parallel) = self.max_parallel {
            options.max_parallel = max_parallel;
        }
        if let Some(secs) = self.timeout_secs {
            options.per_command_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = self.fetch_failure_policy {
            options.fetch_failure_policy = policy;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Parses a YAML string into a `Config`.
///
/// An empty or comment-only document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<Config> {
    let blank = yaml_content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank {
        return Ok(Config::default());
    }

    serde_yaml::from_str::<Config>(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = if message.contains("unknown field") {
            Some(
                "Known fields: git, roots, suffixes, scan_children, target_branch, \
                 preserve_local_changes, max_parallel, timeout_secs, fetch_failure_policy"
                    .to_string(),
            )
        } else {
            None
        };
        Error::ConfigParse { message, hint }
    })
}

/// Reads and parses a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
