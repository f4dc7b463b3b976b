//! Copy of the invoking source file into a task directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use crate::core::layout::backup_file_name;

/// Locate `source` relative to the current working directory.
///
/// See [`resolve_from`].
pub fn resolve_source(source: &Path) -> Result<PathBuf> {
    let cwd = env::current_dir().context("read current directory")?;
    resolve_from(&cwd, source)
}

/// Locate `source` on disk, searching `base` and its ancestors.
///
/// Absolute paths must exist as given. A relative path (as recorded by the
/// compiler for a call site) may be relative to `base` or to any ancestor of
/// it, so a workspace-relative path still resolves from a member crate. It
/// must match exactly one file: with several candidates there is no telling
/// which one is the invoking file, and the lookup fails.
pub fn resolve_from(base: &Path, source: &Path) -> Result<PathBuf> {
    if source.is_absolute() {
        if source.is_file() {
            return Ok(source.to_path_buf());
        }
        bail!("source file {} not found", source.display());
    }
    let candidates: Vec<PathBuf> = base
        .ancestors()
        .map(|dir| dir.join(source))
        .filter(|candidate| candidate.is_file())
        .collect();
    match candidates.as_slice() {
        [] => bail!(
            "source file {} not found from {} or its ancestors",
            source.display(),
            base.display()
        ),
        [only] => Ok(only.clone()),
        several => bail!(
            "source file {} is ambiguous, candidates: {}",
            source.display(),
            several
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Copy the already resolved `source` into `task_dir` as `backup.<file name>`.
pub fn backup_into(source: &Path, task_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| anyhow!("source path {} has no file name", source.display()))?
        .to_string_lossy()
        .into_owned();
    let dest = task_dir.join(backup_file_name(&file_name));
    debug!(source = %source.display(), dest = %dest.display(), "backing up invoking file");
    fs::copy(source, &dest)
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_copies_bytes_with_prefixed_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("sweep.rs");
        fs::write(&source, "fn main() {}\n").expect("write source");
        let task_dir = temp.path().join("task");
        fs::create_dir(&task_dir).expect("mkdir");

        let dest = backup_into(&source, &task_dir).expect("backup");
        assert_eq!(dest, task_dir.join("backup.sweep.rs"));
        assert_eq!(fs::read_to_string(dest).expect("read"), "fn main() {}\n");
    }

    #[test]
    fn missing_source_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = resolve_from(temp.path(), &temp.path().join("gone.rs")).unwrap_err();
        assert!(err.to_string().contains("not found"));
        let err = resolve_from(temp.path(), Path::new("src/gone.rs")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn relative_source_resolves_from_an_ancestor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let member = temp.path().join("member");
        fs::create_dir_all(member.join("src")).expect("mkdir");
        fs::write(member.join("src/main.rs"), "real").expect("write");

        // Workspace-relative path, looked up from inside the member crate.
        let resolved = resolve_from(&member, Path::new("member/src/main.rs")).expect("resolve");
        assert_eq!(resolved, member.join("src/main.rs"));
    }

    /// A same-named file closer to the base must not be taken for the real one.
    #[test]
    fn decoy_at_same_relative_path_makes_lookup_ambiguous() {
        let temp = tempfile::tempdir().expect("tempdir");
        let member = temp.path().join("member");
        fs::create_dir_all(member.join("member/tests")).expect("mkdir decoy dir");
        fs::create_dir_all(member.join("tests")).expect("mkdir real dir");
        fs::write(member.join("tests/run.rs"), "real").expect("write real");
        fs::write(member.join("member/tests/run.rs"), "decoy").expect("write decoy");

        let err = resolve_from(&member, Path::new("member/tests/run.rs")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ambiguous"));
        assert!(msg.contains(&member.join("tests/run.rs").display().to_string()));
    }

    #[test]
    fn call_site_path_of_this_file_resolves() {
        assert!(resolve_source(Path::new(file!())).is_ok());
    }
}
