//! Filesystem helpers shared by the installer and the workflows.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use ignore::{DirEntry, WalkBuilder};

use crate::error::{Error, Result};

/// Create `path` (and parents) if it does not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| Error::fs(path, e))?;
    }
    Ok(())
}

/// Recursively delete `path`, tolerating read-only entries.
///
/// A permission failure is retried exactly once after making the whole tree
/// writable for its owner. A missing `path` is not an error.
pub fn remove_dir_all_forced(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!("{}: {e}; resetting permissions and retrying", path.display());
            make_writable(path)?;
            fs::remove_dir_all(path).map_err(|e| Error::fs(path, e))
        }
        Err(e) => Err(Error::fs(path, e)),
    }
}

fn make_writable(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::fs(path, e))?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    let mut perms = meta.permissions();
    set_owner_writable(&mut perms);
    fs::set_permissions(path, perms).map_err(|e| Error::fs(path, e))?;

    if meta.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| Error::fs(path, e))? {
            let entry = entry.map_err(|e| Error::fs(path, e))?;
            make_writable(&entry.path())?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_writable(perms: &mut fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn set_owner_writable(perms: &mut fs::Permissions) {
    perms.set_readonly(false);
}

/// Walker over every entry below `root`, hidden and git-ignored files
/// included. Symlinks are reported, not followed.
fn walker(root: &Path) -> ignore::Walk {
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build()
}

fn walk_entry(root: &Path, entry: std::result::Result<DirEntry, ignore::Error>) -> Result<DirEntry> {
    entry.map_err(|source| Error::Walk {
        path: root.to_path_buf(),
        source,
    })
}

/// Copy the tree rooted at `src` into `dst`, creating `dst` as needed.
///
/// Symlinks to files are copied as regular files; symlinks to directories are
/// skipped so a link back to an ancestor cannot recurse.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in walker(src) {
        let entry = walk_entry(src, entry)?;
        let from = entry.path();
        let rel = from.strip_prefix(src).unwrap_or(from);
        let to = dst.join(rel);

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            fs::create_dir_all(&to).map_err(|e| Error::fs(&to, e))?;
        } else if file_type.is_file() || from.is_file() {
            fs::copy(from, &to).map_err(|e| Error::fs(from, e))?;
        } else {
            tracing::debug!("skipping {} while copying", from.display());
        }
    }
    Ok(())
}

/// Every regular file below `root` accepted by `keep`, sorted.
///
/// A missing `root` yields an empty list.
pub fn collect_files(root: &Path, keep: &dyn Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in walker(root) {
        let entry = walk_entry(root, entry)?;
        if entry.file_type().is_some_and(|t| t.is_file()) && keep(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}
