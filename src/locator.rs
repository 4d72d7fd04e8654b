//! Locating the git root that owns a path.

use std::path::{Path, PathBuf};

/// Name of the metadata entry marking a working-copy root.
///
/// It is a directory in a normal clone and a file in linked worktrees and
/// submodules, so both count.
pub const VCS_MARKER: &str = ".git";

/// Walk from `path` up through its parents and return the first directory
/// containing [`VCS_MARKER`].
///
/// Relative paths are resolved against the current directory first. Returns
/// `None` when no ancestor is a working-copy root.
pub fn locate_root(path: &Path) -> Option<PathBuf> {
    let start = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let start = start.canonicalize().unwrap_or(start);

    start
        .ancestors()
        .find(|dir| dir.join(VCS_MARKER).exists())
        .map(Path::to_path_buf)
}

/// Whether `path` itself is a working-copy root.
pub fn is_root(path: &Path) -> bool {
    path.join(VCS_MARKER).exists()
}
