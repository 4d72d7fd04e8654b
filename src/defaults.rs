//! Default values for branch-sync configuration.
//!
//! This module provides centralized default values used across the library
//! and the CLI, ensuring consistency and avoiding duplication.

use std::time::Duration;

/// File name looked up in the current directory when no config is given.
pub const CONFIG_FILE_NAME: &str = ".branch-sync.yaml";

/// File name of the per-user configuration under the platform config directory.
pub const USER_CONFIG_FILE_NAME: &str = "config.yaml";

/// Executable used when no `git` path is configured.
pub const GIT_PROGRAM: &str = "git";

/// Number of repositories switched at the same time.
pub const MAX_PARALLEL: usize = 4;

/// Upper bound on any single git invocation.
pub const PER_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Lines of command output kept in a transcript entry.
pub const TRANSCRIPT_TAIL_LINES: usize = 8;

/// How long a cached branch listing stays valid.
pub const BRANCH_CACHE_TTL: Duration = Duration::from_secs(30);

/// Suffixes used when none are configured: the parent directory itself.
pub fn suffixes() -> Vec<String> {
    vec![".".to_string()]
}
