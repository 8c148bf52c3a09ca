use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the version-control marker that identifies the repository root.
pub const MARKER: &str = ".git";

/// Walk from `start` towards the filesystem root and return the first
/// directory containing a `.git` entry.
///
/// Worktrees and submodules use a `.git` file instead of a directory, so any
/// entry with that name counts.
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let start = std::path::absolute(start).map_err(|e| Error::fs(start, e))?;

    let root = start
        .ancestors()
        .find(|dir| dir.join(MARKER).exists())
        .map(Path::to_path_buf);

    root.ok_or(Error::RepoRootNotFound { start })
}
