//! # Repository Discovery
//!
//! Discovery turns a set of parent directories into a de-duplicated list of
//! [`Repository`] values:
//!
//! 1.  **Expansion (`candidates`)**: each parent directory is combined with
//!     the configured subdirectory suffixes, and optionally with each of its
//!     immediate child directories, producing labelled candidate paths.
//! 2.  **Resolution (`discover`)**: every candidate is resolved to its git
//!     root independently and in parallel. Candidates that are not inside a
//!     working copy are skipped; candidates resolving to a root already seen
//!     are dropped, keeping the first label.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::locator;
use crate::repository::Repository;

/// A labelled path that may or may not be inside a working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub label: String,
    pub path: PathBuf,
}

impl Candidate {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand parent directories into candidate paths.
///
/// A suffix of `"."` (or empty) stands for the parent directory itself. When
/// `scan_children` is set, every non-hidden immediate child directory is a
/// candidate too.
pub fn candidates(roots: &[PathBuf], suffixes: &[String], scan_children: bool) -> Vec<Candidate> {
    let mut out = Vec::new();

    for root in roots {
        let root_name = dir_name(root);

        for suffix in suffixes {
            let suffix = suffix.trim_matches('/');
            if suffix.is_empty() || suffix == "." {
                out.push(Candidate::new(root_name.clone(), root.clone()));
            } else {
                out.push(Candidate::new(
                    format!("{}/{}", root_name, suffix),
                    root.join(suffix),
                ));
            }
        }

        if scan_children {
            let children = WalkDir::new(root)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_dir())
                .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'));
            for entry in children {
                out.push(Candidate::new(
                    entry.file_name().to_string_lossy().into_owned(),
                    entry.into_path(),
                ));
            }
        }
    }

    out
}

/// Resolve candidates to repositories, one per distinct git root.
///
/// The result is sorted by display name, case-insensitively.
pub fn discover(candidates: &[Candidate]) -> Vec<Repository> {
    let resolved: Vec<(usize, PathBuf)> = candidates
        .par_iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.path.is_dir())
        .filter_map(|(index, candidate)| {
            locator::locate_root(&candidate.path).map(|root| (index, root))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut repositories = Vec::new();
    for (index, root) in resolved {
        if !seen.insert(root.clone()) {
            debug!(
                "skipping {}: already discovered {}",
                candidates[index].path.display(),
                root.display()
            );
            continue;
        }
        let candidate = &candidates[index];
        let name = if candidate.path.canonicalize().ok().as_deref() == Some(root.as_path()) {
            candidate.label.clone()
        } else {
            dir_name(&root)
        };
        repositories.push(Repository::new(root, name));
    }

    repositories.sort_by_key(|repo| repo.name.to_lowercase());
    repositories
}
