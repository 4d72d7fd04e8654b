//! # Error Suggestions
//!
//! Helper functions for error messages that carry hints. Errors should tell
//! users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use branch_sync::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::{Path, PathBuf};

/// Generate an error for when an explicitly named configuration file is missing.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a .branch-sync.yaml file listing your repository roots\n\
         hint: Use -c/--config to specify a different path\n\
         hint: Set BRANCH_SYNC_CONFIG environment variable",
        path = path.display()
    )
}

/// Generate an error for when discovery found no working copies at all.
pub fn no_repositories_found(roots: &[PathBuf]) -> anyhow::Error {
    let searched = roots
        .iter()
        .map(|r| format!("  {}", r.display()))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::anyhow!(
        "No git repositories found under:\n{searched}\n\n\
         hint: Pass the directories that contain your working copies as PATHS\n\
         hint: Set 'roots' (and 'suffixes' for nested checkouts) in .branch-sync.yaml"
    )
}

/// Generate an error for a sync without a branch to switch to.
pub fn missing_target_branch() -> anyhow::Error {
    anyhow::anyhow!(
        "No target branch given\n\n\
         hint: Run 'branch-sync sync --branch <BRANCH>'\n\
         hint: Or set 'target_branch' in .branch-sync.yaml"
    )
}

/// Generate an error for a branch that no repository has.
///
/// Suggests the closest known branch name when one is near enough.
pub fn branch_not_found_anywhere(branch: &str, known: &[String]) -> anyhow::Error {
    let known: Vec<&str> = known.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(branch, &known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Branch '{branch}' was not found in any repository, locally or on origin{did_you_mean}\n\n\
         hint: Run 'branch-sync branches --filter <TEXT>' to search the known branches\n\
         hint: Push the branch to origin first if it only exists on another machine"
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                0
            } else {
                1
            };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}
