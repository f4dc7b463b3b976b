//! On-disk layout of runs and tasks.
//!
//! ```text
//! <run_dir>/
//! ├── bureaucrat_run_info.txt          marker: this directory is a run
//! └── <task_name>/
//!     ├── bureaucrat_task_report.txt   first line: success or failure sentinel
//!     ├── backup.<invoking file name>
//!     └── subruns/
//!         └── <subrun_name>/           itself a full run
//! ```

use std::path::{Path, PathBuf};

/// File whose presence (as a regular file) defines a run.
pub const RUN_MARKER_FILE: &str = "bureaucrat_run_info.txt";

/// File whose first line records a task's completion state.
pub const TASK_REPORT_FILE: &str = "bureaucrat_task_report.txt";

/// Directory under a task holding its subruns.
pub const SUBRUNS_DIR: &str = "subruns";

/// Prefix of the invoking-file copy placed in a task directory.
pub const BACKUP_PREFIX: &str = "backup.";

// Sentinel pair, version 1. Readers compare the first line for exact equality,
// so changing either string orphans every existing report.

/// First line of a report for a task that completed.
pub const SUCCESS_SENTINEL: &str = "exit_status: task completed successfully with no errors :)";

/// First line of a report for a task that ended with an error.
pub const FAILURE_SENTINEL: &str =
    "exit_status: task could not be completed because there were errors :(";

pub fn marker_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RUN_MARKER_FILE)
}

pub fn task_dir(run_dir: &Path, task_name: &str) -> PathBuf {
    run_dir.join(task_name)
}

pub fn report_path(task_dir: &Path) -> PathBuf {
    task_dir.join(TASK_REPORT_FILE)
}

pub fn subruns_dir(task_dir: &Path) -> PathBuf {
    task_dir.join(SUBRUNS_DIR)
}

/// Name of the backup copy for a source file named `file_name`.
pub fn backup_file_name(file_name: &str) -> String {
    format!("{BACKUP_PREFIX}{file_name}")
}

/// First line written to a run's marker file.
pub fn marker_line(run_name: &str, timestamp: &str) -> String {
    format!(
        "This directory contains a run named '{run_name}', created by the bookkeeping tool on {timestamp}."
    )
}

/// Timestamp format used in marker and report files.
pub fn timestamp_now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f UTC")
        .to_string()
}
