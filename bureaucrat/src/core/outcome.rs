//! Classification of a task scope's exit and rendering of the report text.
//!
//! Every exit path of a task scope maps to exactly one [`TaskOutcome`]; the
//! report contents and the decision to propagate the error are both derived
//! from that tag.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Write as _;

use super::layout::{FAILURE_SENTINEL, SUCCESS_SENTINEL};

/// How a task scope ended, before classification.
#[derive(Debug)]
pub enum ScopeExit<'a> {
    /// The body returned `Ok`.
    Completed,
    /// The body returned an error.
    Errored(&'a anyhow::Error),
    /// The body panicked with the given message.
    Panicked(&'a str),
    /// The scope guard was dropped without being finished.
    Abandoned,
}

/// Description of an error as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Debug rendering of the root cause, e.g. `Interrupted` or `ValueError("boom")`.
    pub kind: String,
    /// Display rendering of the outermost error.
    pub message: String,
    /// Display renderings of the rest of the error chain, outermost first.
    pub causes: Vec<String>,
    /// Backtrace from where the error was created if anyhow recorded one,
    /// otherwise from where the scope was closed.
    pub backtrace: String,
}

impl ErrorRecord {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let backtrace = match err.backtrace().status() {
            BacktraceStatus::Captured => err.backtrace().to_string(),
            _ => closing_backtrace(),
        };
        Self {
            kind: format!("{:?}", err.root_cause()),
            message: err.to_string(),
            causes: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
            backtrace,
        }
    }

    fn synthetic(kind: &str, message: &str) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            causes: Vec::new(),
            backtrace: closing_backtrace(),
        }
    }
}

fn closing_backtrace() -> String {
    format!("(taken when the task scope closed)\n{}", Backtrace::force_capture())
}

/// Classified result of a task scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body completed without error.
    Succeeded,
    /// The body failed with an error the caller marked as allowed.
    Tolerated { allowed_by: String, error: ErrorRecord },
    /// The body failed.
    Failed(ErrorRecord),
}

impl TaskOutcome {
    /// True if the report records success.
    pub fn is_success(&self) -> bool {
        !matches!(self, TaskOutcome::Failed(_))
    }

    /// True if the error that ended the scope must reach the caller.
    pub fn propagates(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn sentinel(&self) -> &'static str {
        if self.is_success() {
            SUCCESS_SENTINEL
        } else {
            FAILURE_SENTINEL
        }
    }
}

/// Classify how a scope ended.
///
/// `allowed` returns the label of the allowed-error entry matching an error,
/// if any. Panics and abandoned scopes are never allowed.
pub fn classify<F>(exit: ScopeExit<'_>, allowed: F) -> TaskOutcome
where
    F: Fn(&anyhow::Error) -> Option<String>,
{
    match exit {
        ScopeExit::Completed => TaskOutcome::Succeeded,
        ScopeExit::Errored(err) => match allowed(err) {
            Some(allowed_by) => TaskOutcome::Tolerated {
                allowed_by,
                error: ErrorRecord::from_error(err),
            },
            None => TaskOutcome::Failed(ErrorRecord::from_error(err)),
        },
        ScopeExit::Panicked(message) => {
            TaskOutcome::Failed(ErrorRecord::synthetic("panic", message))
        }
        ScopeExit::Abandoned => TaskOutcome::Failed(ErrorRecord::synthetic(
            "abandoned",
            "task scope was dropped without being finished",
        )),
    }
}

/// Render the full report file for `task_name`.
pub fn render_report(outcome: &TaskOutcome, task_name: &str, timestamp: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", outcome.sentinel());
    match outcome {
        TaskOutcome::Succeeded => {
            let _ = writeln!(
                out,
                "The sole purpose of this file is to indicate that task '{task_name}' was completed with no errors on {timestamp}."
            );
        }
        TaskOutcome::Tolerated { allowed_by, error } => {
            let _ = writeln!(
                out,
                "The sole purpose of this file is to indicate that task '{task_name}' was completed with no errors on {timestamp}."
            );
            let _ = writeln!(out, "---");
            let _ = writeln!(
                out,
                "The task ended early with an allowed error ({allowed_by}):"
            );
            write_error(&mut out, error);
        }
        TaskOutcome::Failed(error) => {
            let _ = writeln!(
                out,
                "If you are reading this it means that task '{task_name}' ended with errors on {timestamp}."
            );
            let _ = writeln!(out, "---");
            let _ = writeln!(out, "Backtrace:");
            let _ = writeln!(out, "{}", error.backtrace.trim_end());
            let _ = writeln!(out, "---");
            write_error(&mut out, error);
        }
    }
    out
}

fn write_error(out: &mut String, error: &ErrorRecord) {
    let _ = writeln!(out, "{}: {}", error.kind, error.message);
    if !error.causes.is_empty() {
        let _ = writeln!(out, "Caused by:");
        for (idx, cause) in error.causes.iter().enumerate() {
            let _ = writeln!(out, "    {idx}: {cause}");
        }
    }
}
