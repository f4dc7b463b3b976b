//! Structural ancestry of runs.
//!
//! A run located at `.../<parent_run>/<task_name>/subruns/<this_run>` is a
//! subrun of `<parent_run>`. The lookup here is purely on path components;
//! whether the candidate actually is a run is decided by the caller.

use std::path::Path;

use super::layout::SUBRUNS_DIR;

/// Return the directory that would be the parent run of `run_dir`, if the path
/// has the `<parent>/<task>/subruns/<run>` shape.
pub fn structural_parent(run_dir: &Path) -> Option<&Path> {
    let subruns = run_dir.parent()?;
    if subruns.file_name()? != SUBRUNS_DIR {
        return None;
    }
    let task_dir = subruns.parent()?;
    task_dir.file_name()?;
    let parent_run = task_dir.parent()?;
    parent_run.file_name()?;
    Some(parent_run)
}

/// Join run names ordered root-first into a `/`-separated pseudopath.
pub fn join_pseudopath<I, S>(names_root_first: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names_root_first
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
