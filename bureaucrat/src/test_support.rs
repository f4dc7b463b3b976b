//! Test-only helpers for building runs in temporary directories.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::config::IfExists;
use crate::core::layout::report_path;
use crate::run::RunHandle;

/// A created run named `name` inside a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the run is used.
pub fn scratch_run(name: &str) -> (TempDir, RunHandle) {
    let temp = tempfile::tempdir().expect("tempdir");
    let run = RunHandle::new(temp.path().join(name)).expect("run handle");
    run.create_run(IfExists::Raise).expect("create run");
    (temp, run)
}

/// Full text of the report of `task_name` in `run`.
pub fn read_report(run: &RunHandle, task_name: &str) -> String {
    let path = report_path(&run.path_to_task_directory(task_name));
    fs::read_to_string(&path).expect("read task report")
}

/// Names of the entries directly inside `dir`, sorted.
pub fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
