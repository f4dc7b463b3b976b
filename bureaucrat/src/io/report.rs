//! Task report file: write on scope exit, read for completion queries.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::layout::{SUCCESS_SENTINEL, report_path, timestamp_now};
use crate::core::outcome::{TaskOutcome, render_report};

/// Write the report for `task_name` into `task_dir`, replacing any previous one.
pub fn write_report(task_dir: &Path, task_name: &str, outcome: &TaskOutcome) -> Result<()> {
    let path = report_path(task_dir);
    debug!(path = %path.display(), success = outcome.is_success(), "writing task report");
    let contents = render_report(outcome, task_name, &timestamp_now());
    fs::write(&path, contents).with_context(|| format!("write task report {}", path.display()))
}

/// First line of the report in `task_dir`, without its line terminator.
pub fn read_first_line(task_dir: &Path) -> Result<String> {
    let path = report_path(task_dir);
    let file = File::open(&path).with_context(|| format!("open task report {}", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("read task report {}", path.display()))?;
    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    Ok(trimmed.to_string())
}

/// True iff the report in `task_dir` starts with the success sentinel.
///
/// Any read failure counts as "not succeeded".
pub fn report_says_success(task_dir: &Path) -> bool {
    match read_first_line(task_dir) {
        Ok(line) => line == SUCCESS_SENTINEL,
        Err(err) => {
            debug!(error = %err, "task report unreadable");
            false
        }
    }
}
