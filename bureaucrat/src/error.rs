//! Error taxonomy and non-fatal warnings.
//!
//! Fallible operations return `anyhow::Result`; the failures this crate
//! originates are [`Error`] values inside the `anyhow::Error`, so callers can
//! classify them with `err.downcast_ref::<bureaucrat::Error>()`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum Error {
    /// Run creation with the `raise` policy found an existing run.
    #[error("cannot create run '{name}' in {}: it already exists", .parent.display())]
    AlreadyExists { parent: PathBuf, name: String },

    /// The addressed directory does not satisfy the run-existence predicate.
    #[error("{} does not look like the directory of a run", .path.display())]
    NotARun { path: PathBuf },

    /// A task handle was entered a second time.
    #[error(
        "task handle for '{task}' can only be used once; create a new one with `handle_task`"
    )]
    TaskReuse { task: String },

    /// Prerequisite tasks are missing or failed.
    #[error("tasks {failed:?} were not successfully run beforehand on run '{run}' located in {}", .path.display())]
    TaskNotCompleted {
        failed: Vec<String>,
        run: String,
        path: PathBuf,
    },

    /// Malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Non-fatal diagnostics. Logged, recorded on the task handle, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("{subject} contains the characters {characters:?} which are better to avoid in paths")]
    UnsafeCharacters {
        subject: String,
        characters: BTreeSet<char>,
    },

    #[error("could not back up {} into the task directory: {reason}", .source_file.display())]
    BackupFailed { source_file: PathBuf, reason: String },
}

impl Warning {
    /// Log the warning and hand it back for recording.
    pub fn emit(self) -> Self {
        warn!(warning = %self, "bureaucrat warning");
        self
    }
}
