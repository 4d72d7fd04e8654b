//! # Error Handling
//!
//! This module defines the centralized error type for the `branch-sync`
//! library. It uses `thiserror` to build a single `Error` enum covering every
//! failure the library reports through `Result`.
//!
//! Note that an ordinary git command failing (non-zero exit) is *not* an
//! `Error`. Those are normal, reportable outcomes carried by
//! [`CommandOutput`](crate::process::CommandOutput) and recorded in a
//! transaction transcript. `Error` is reserved for failures that stop a
//! library call from producing a result at all:
//!
//! - Configuration parsing and validation problems.
//! - A git query whose output is needed but could not be obtained.
//! - Scheduling preconditions (duplicate repositories, worker pool setup).
//! - Load requests superseded by a newer request.
//! - I/O and YAML errors.

use thiserror::Error;

/// Main error type for branch-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file or flags could not be parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A configuration value parsed but is not acceptable.
    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigInvalid { field: String, message: String },

    /// A git query failed while its output was required.
    #[error("Git command failed in {path}: git {command} - {stderr}")]
    GitCommand {
        command: String,
        path: String,
        stderr: String,
    },

    /// The same working copy was handed to one scheduling run twice.
    #[error("Repository scheduled more than once in the same run: {path}")]
    DuplicateRepository { path: String },

    /// A load was overtaken by a newer request and its result was dropped.
    #[error("Load superseded by a newer request (generation {generation})")]
    Superseded { generation: u64 },

    /// The worker pool could not be created.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
