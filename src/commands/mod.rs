//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `branch-sync` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes a [`Workspace`] and the parsed `Args`
//!   and calls into the `branch_sync` library to do the work.
//!
//! [`Workspace`] holds what every repository-facing command needs: the
//! loaded configuration, the directory its relative roots are resolved
//! against, and the output preferences.

pub mod branches;
pub mod completions;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;

use branch_sync::config::{self, Config};
use branch_sync::defaults;
use branch_sync::discovery::{self, Candidate};
use branch_sync::output::OutputConfig;
use branch_sync::process::SystemProcessRunner;
use branch_sync::repository::Repository;
use branch_sync::suggestions;

/// Configuration and environment shared by the repository commands.
pub struct Workspace {
    pub config: Config,
    pub output: OutputConfig,
    base_dir: PathBuf,
    cwd: PathBuf,
}

impl Workspace {
    /// Load the configuration named by `explicit`, else `.branch-sync.yaml`
    /// in the current directory, else the per-user file, else the defaults.
    pub fn load(explicit: Option<&Path>, output: OutputConfig) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine the current directory")?;

        let (config, base_dir) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(suggestions::config_not_found(path));
                }
                let config = read_config(path)?;
                let base_dir = cwd.join(path.parent().unwrap_or_else(|| Path::new("")));
                (config, base_dir)
            }
            None => {
                let implicit = cwd.join(defaults::CONFIG_FILE_NAME);
                if implicit.is_file() {
                    (read_config(&implicit)?, cwd.clone())
                } else if let Some(user) = user_config_path().filter(|p| p.is_file()) {
                    let base_dir = user.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
                    (read_config(&user)?, base_dir)
                } else {
                    debug!("no {} in {}, using defaults", defaults::CONFIG_FILE_NAME, cwd.display());
                    (Config::default(), cwd.clone())
                }
            }
        };

        Ok(Self {
            config,
            output,
            base_dir,
            cwd,
        })
    }

    /// Runner for the configured git, or `git_override` when given.
    pub fn runner(&self, git_override: Option<&Path>) -> SystemProcessRunner {
        match git_override {
            Some(program) => SystemProcessRunner::new(program),
            None => SystemProcessRunner::new(self.config.git_program()),
        }
    }

    pub fn per_command_timeout(&self) -> Duration {
        self.config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults::PER_COMMAND_TIMEOUT)
    }

    /// Parent directories to search: `paths` when given, else the configured
    /// roots, else the current directory.
    pub fn roots(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        if !paths.is_empty() {
            paths.iter().map(|p| self.cwd.join(p)).collect()
        } else if !self.config.roots.is_empty() {
            self.config.roots.iter().map(|r| self.base_dir.join(r)).collect()
        } else {
            vec![self.cwd.clone()]
        }
    }

    pub fn candidates(&self, paths: &[PathBuf]) -> Vec<Candidate> {
        discovery::candidates(&self.roots(paths), &self.config.suffixes, self.config.scan_children)
    }

    /// Discover repositories, failing with a hint when there are none.
    pub fn discover(&self, paths: &[PathBuf]) -> Result<Vec<Repository>> {
        let repositories = discovery::discover(&self.candidates(paths));
        if repositories.is_empty() {
            return Err(suggestions::no_repositories_found(&self.roots(paths)));
        }
        debug!("discovered {} repositories", repositories.len());
        Ok(repositories)
    }
}

/// `<config dir>/branch-sync/config.yaml`, e.g. `~/.config/branch-sync/config.yaml`.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("branch-sync").join(defaults::USER_CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<Config> {
    config::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
