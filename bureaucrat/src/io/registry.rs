//! Creation and existence of runs.
//!
//! A directory is a run iff it contains the marker file; the directory alone
//! means nothing. Creation is check-then-act and is not safe against other
//! processes creating the same run concurrently: both may observe "absent",
//! and the slower one then writes over the marker of the faster one. Callers
//! that share a run location across processes must serialize creation
//! themselves.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::layout::{marker_line, marker_path, timestamp_now};
use crate::core::naming::check_naming;
use crate::error::Error;

pub use super::fs_ops::delete_subtree;

/// True iff `parent_dir/name/<marker>` is a regular file.
pub fn run_exists(parent_dir: &Path, name: &str) -> bool {
    marker_path(&parent_dir.join(name)).is_file()
}

/// Create the run `name` under `parent_dir` and write its marker file.
///
/// Fails with [`Error::AlreadyExists`] if the run exists. Missing ancestors
/// are created. A name with unusual characters is logged as a warning but
/// still created.
pub fn create_run(parent_dir: &Path, name: &str) -> Result<PathBuf> {
    let run_dir = parent_dir.join(name);
    if let Some(warning) = check_naming(&run_dir.to_string_lossy()) {
        warning.emit();
    }
    if run_exists(parent_dir, name) {
        return Err(Error::AlreadyExists {
            parent: parent_dir.to_path_buf(),
            name: name.to_string(),
        }
        .into());
    }

    debug!(path = %run_dir.display(), "creating run directory");
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create run directory {}", run_dir.display()))?;

    let marker = marker_path(&run_dir);
    let mut contents = marker_line(name, &timestamp_now());
    contents.push('\n');
    fs::write(&marker, contents).with_context(|| format!("write marker {}", marker.display()))?;

    info!(run = %name, path = %run_dir.display(), "run created");
    Ok(run_dir)
}
