//! Recursive removal helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Remove a file or directory tree. A missing path is a no-op.
pub fn delete_subtree(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
    };
    debug!(path = %path.display(), "deleting subtree");
    if meta.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove directory {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("remove file {}", path.display()))
    }
}

/// Delete every entry inside `dir`, keeping `dir` itself.
pub fn clear_directory(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        delete_subtree(&entry.path())?;
    }
    Ok(())
}
