//! # Repository Model
//!
//! A [`Repository`] is one discovered working copy. Its identity is the
//! absolute root path; everything else is last-known state that inspection
//! and switch transactions refresh in place.
//!
//! Whoever discovered a set of repositories owns them. The scheduler lends
//! each one as a `&mut Repository` to exactly one task at a time. Readers
//! that need a stable view hold a published snapshot (see [`crate::loader`]).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::inspector::Inspection;
use crate::transaction::SwitchOutcome;

/// Ahead/behind commit counts relative to an upstream branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    /// Local commits not on the upstream.
    pub ahead: u32,
    /// Upstream commits not on the local branch.
    pub behind: u32,
}

/// Result of comparing the current branch with its upstream.
///
/// "No upstream" is a different answer from "zero ahead, zero behind" and the
/// two must never be folded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpstreamStatus {
    NoUpstream,
    Tracking(SyncCounts),
}

impl UpstreamStatus {
    pub fn counts(&self) -> Option<SyncCounts> {
        match self {
            UpstreamStatus::NoUpstream => None,
            UpstreamStatus::Tracking(counts) => Some(*counts),
        }
    }
}

/// Success flag and message from the most recent operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastOutcome {
    pub success: bool,
    pub message: String,
}

/// A discovered working copy and its last-known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    root: PathBuf,
    /// Display name, usually the discovery label.
    pub name: String,
    /// Last-known current branch, or a detached-state label.
    pub current_branch: Option<String>,
    pub last_outcome: Option<LastOutcome>,
    /// Commits on the upstream not yet pulled.
    pub incoming: u32,
    /// Local commits not yet pushed.
    pub outgoing: u32,
    pub dirty: bool,
    /// Whether the current branch has an upstream, so the counts mean something.
    pub upstream_known: bool,
    /// Number of stash entries at last inspection.
    pub stash_count: usize,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            current_branch: None,
            last_outcome: None,
            incoming: 0,
            outgoing: 0,
            dirty: false,
            upstream_known: false,
            stash_count: 0,
        }
    }

    /// Absolute root path; the repository's identity.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Label shown for the current branch, `"(unknown)"` before inspection.
    pub fn branch_label(&self) -> &str {
        self.current_branch.as_deref().unwrap_or("(unknown)")
    }

    pub fn upstream(&self) -> UpstreamStatus {
        if self.upstream_known {
            UpstreamStatus::Tracking(SyncCounts {
                ahead: self.outgoing,
                behind: self.incoming,
            })
        } else {
            UpstreamStatus::NoUpstream
        }
    }

    /// Copy freshly inspected state into this repository.
    pub fn apply_inspection(&mut self, inspection: Inspection) {
        self.current_branch = Some(inspection.branch);
        self.dirty = inspection.dirty;
        self.stash_count = inspection.stash_count;
        match inspection.upstream {
            UpstreamStatus::Tracking(counts) => {
                self.upstream_known = true;
                self.outgoing = counts.ahead;
                self.incoming = counts.behind;
            }
            UpstreamStatus::NoUpstream => {
                self.upstream_known = false;
                self.outgoing = 0;
                self.incoming = 0;
            }
        }
    }

    /// Record the result of a switch transaction.
    pub fn record_outcome(&mut self, outcome: &SwitchOutcome) {
        self.last_outcome = Some(LastOutcome {
            success: outcome.success,
            message: outcome.summary(),
        });
    }
}
