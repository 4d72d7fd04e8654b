//! # Branch Sync Library
//!
//! This library switches many git working copies to the same branch at once.
//! It is designed to be used by the `branch-sync` command-line tool but can
//! also be embedded in other applications that manage groups of related
//! repositories.
//!
//! ## Quick Example
//!
//! ```no_run
//! use branch_sync::config::SyncOptions;
//! use branch_sync::discovery::{self, Candidate};
//! use branch_sync::process::SystemProcessRunner;
//! use branch_sync::scheduler::{ProgressEvent, SyncScheduler};
//!
//! let candidates = vec![Candidate::new("api", "/work/api"), Candidate::new("web", "/work/web")];
//! let mut repositories = discovery::discover(&candidates);
//!
//! let runner = SystemProcessRunner::default();
//! let options = SyncOptions::new("release/2.0").max_parallel(2);
//! let summary = SyncScheduler::new(&runner)
//!     .run(&mut repositories, &options, &|event: &ProgressEvent<'_>| {
//!         println!("{}/{} {}: {}", event.index, event.total, event.repository.name, event.outcome.summary());
//!     })
//!     .unwrap();
//! assert_eq!(summary.total, repositories.len());
//! ```
//!
//! ## Core Concepts
//!
//! - **Process execution (`process`)**: Runs git as a child process with a
//!   per-command timeout and a non-interactive environment.
//! - **Discovery (`locator`, `discovery`)**: Resolves candidate paths to git
//!   roots and de-duplicates them.
//! - **Inspection (`inspector`)**: Read-only queries for the current branch,
//!   upstream counts, dirtiness, stashes and available branches.
//! - **Switching (`transaction`)**: The per-repository protocol that saves
//!   or discards local changes, fetches, checks out, pulls and restores.
//! - **Scheduling (`scheduler`, `gate`)**: Runs one transaction per
//!   repository on a bounded worker pool and reports progress.
//! - **Loading (`loader`)**: Discovery plus inspection that a newer load can
//!   supersede, publishing immutable snapshots.
//!
//! ## Execution Flow
//!
//! 1.  **Discovery**: Expand configured roots into candidates and resolve
//!     them to distinct repositories.
//! 2.  **Scheduling**: Hand each repository to a worker, at most
//!     `max_parallel` at a time.
//! 3.  **Switching**: Each worker runs the switch protocol to completion and
//!     records the outcome on its repository.
//! 4.  **Reporting**: Progress events stream out as repositories finish; a
//!     summary is returned once all are done.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod inspector;
pub mod loader;
pub mod locator;
pub mod output;
pub mod process;
pub mod repository;
pub mod scheduler;
pub mod suggestions;
pub mod transaction;

#[cfg(test)]
mod testing;
