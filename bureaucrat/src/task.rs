//! Scoped execution of one task within a run.
//!
//! A [`TaskHandle`] moves through `NotEntered -> Entered -> Finalized` exactly
//! once. Entering prepares the task directory and, if enabled, backs up the
//! invoking file; it yields a [`TaskScope`]. Finishing the scope (or dropping
//! it, including during a panic) writes the task report.

use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::{IfExists, TaskOptions};
use crate::core::layout::subruns_dir;
use crate::core::naming::is_single_component;
use crate::core::outcome::{ScopeExit, TaskOutcome, classify};
use crate::error::{Error, Warning};
use crate::io::backup::{backup_into, resolve_source};
use crate::io::fs_ops::clear_directory;
use crate::io::report::write_report;
use crate::run::RunHandle;

/// Lifecycle position of a [`TaskHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotEntered,
    Entered,
    Finalized,
}

type ErrorPredicate = Box<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Error kinds that end a task early without counting as a failure.
#[derive(Default)]
pub struct AllowedErrors {
    entries: Vec<(String, ErrorPredicate)>,
}

impl AllowedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow errors that downcast to `E` (through any context layers).
    pub fn allow<E>(&mut self)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let label = std::any::type_name::<E>().to_string();
        let predicate: ErrorPredicate =
            Box::new(|err: &anyhow::Error| err.downcast_ref::<E>().is_some());
        self.entries.push((label, predicate));
    }

    /// Allow errors matching `predicate`, reported under `label`.
    pub fn allow_if<F>(&mut self, label: impl Into<String>, predicate: F)
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        let predicate: ErrorPredicate = Box::new(predicate);
        self.entries.push((label.into(), predicate));
    }

    /// Label of the first entry matching `err`.
    pub fn matching(&self, err: &anyhow::Error) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, predicate)| predicate(err))
            .map(|(label, _)| label.clone())
    }

}

impl fmt::Debug for AllowedErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(label, _)| label))
            .finish()
    }
}

/// Where the invoking file is, decided when the handle is created.
#[derive(Debug)]
enum BackupSource {
    Resolved(PathBuf),
    Unresolved { requested: PathBuf, reason: String },
}

impl BackupSource {
    fn locate(requested: PathBuf) -> Self {
        match resolve_source(&requested) {
            Ok(path) => BackupSource::Resolved(path),
            Err(err) => BackupSource::Unresolved {
                requested,
                reason: format!("{err:#}"),
            },
        }
    }
}

/// One task of a run, usable as a scoped resource exactly once.
#[derive(Debug)]
pub struct TaskHandle {
    run: RunHandle,
    task_name: String,
    options: TaskOptions,
    allowed: AllowedErrors,
    /// File copied into the task directory on enter when backups are enabled.
    backup_source: BackupSource,
    state: TaskState,
    warnings: Vec<Warning>,
}

impl TaskHandle {
    pub(crate) fn new(
        run: RunHandle,
        task_name: &str,
        options: TaskOptions,
        backup_source: PathBuf,
    ) -> Self {
        Self {
            run,
            task_name: task_name.to_string(),
            options,
            allowed: AllowedErrors::new(),
            backup_source: BackupSource::locate(backup_source),
            state: TaskState::NotEntered,
            warnings: Vec::new(),
        }
    }

    /// Treat errors of type `E` raised by the body as a successful completion.
    pub fn allow<E>(mut self) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.allowed.allow::<E>();
        self
    }

    /// Treat errors matching `predicate` as a successful completion.
    pub fn allow_if<F>(mut self, label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.allowed.allow_if(label, predicate);
        self
    }

    /// Back up `path` instead of the file that called `handle_task`.
    ///
    /// Relative paths are resolved against the current directory now, not
    /// when the task is entered.
    pub fn backup_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_source = BackupSource::locate(path.into());
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// The run this task belongs to.
    pub fn run(&self) -> &RunHandle {
        &self.run
    }

    /// Directory of this task inside the run.
    pub fn directory(&self) -> PathBuf {
        self.run.path_to_task_directory(&self.task_name)
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Warnings emitted for this task so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn record_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Prepare the task directory and start the scope.
    ///
    /// With `drop_old_data` the directory is emptied first; with
    /// `backup_invoking_script` the invoking file is then copied in, so the
    /// backup reflects the file as it was when the task started. Fails with
    /// [`Error::TaskReuse`] unless the handle has never been entered.
    pub fn enter(&mut self) -> Result<TaskScope<'_>> {
        if self.state != TaskState::NotEntered {
            return Err(Error::TaskReuse {
                task: self.task_name.clone(),
            }
            .into());
        }
        let dir = self.directory();
        if self.options.drop_old_data && dir.is_dir() {
            debug!(task = %self.task_name, path = %dir.display(), "dropping old task data");
            clear_directory(&dir)?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("create task directory {}", dir.display()))?;
        if self.options.backup_invoking_script {
            self.backup(&dir);
        }
        self.state = TaskState::Entered;
        info!(task = %self.task_name, run = %self.run.name(), "task entered");
        Ok(TaskScope {
            task: self,
            finished: false,
        })
    }

    /// Copy the invoking file into `dir`. Failures only produce a warning.
    fn backup(&mut self, dir: &Path) {
        let failure = match &self.backup_source {
            BackupSource::Resolved(source) => backup_into(source, dir)
                .err()
                .map(|err| (source.clone(), format!("{err:#}"))),
            BackupSource::Unresolved { requested, reason } => {
                Some((requested.clone(), reason.clone()))
            }
        };
        if let Some((source_file, reason)) = failure {
            let warning = Warning::BackupFailed {
                source_file,
                reason,
            };
            self.record_warning(warning.emit());
        }
    }

    /// Run `body` inside the task scope.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` if the body failed with
    /// an allowed error, and the body's own error otherwise. The report is
    /// written in every case; a panic in `body` is recorded as a failure and
    /// then resumed.
    pub fn execute<T, F>(&mut self, body: F) -> Result<Option<T>>
    where
        F: FnOnce(&TaskScope<'_>) -> Result<T>,
    {
        let mut scope = self.enter()?;
        match panic::catch_unwind(AssertUnwindSafe(|| body(&scope))) {
            Ok(result) => scope.finish(result),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                if let Err(err) = scope.close(ScopeExit::Panicked(&message)) {
                    error!(error = %err, "failed to record panicked task");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

/// An entered task. Finish it with [`TaskScope::finish`]; dropping it
/// unfinished records a failure.
#[derive(Debug)]
pub struct TaskScope<'a> {
    task: &'a mut TaskHandle,
    finished: bool,
}

impl TaskScope<'_> {
    pub fn task_name(&self) -> &str {
        &self.task.task_name
    }

    /// Directory where the task should write its output.
    pub fn directory(&self) -> PathBuf {
        self.task.directory()
    }

    pub fn run(&self) -> &RunHandle {
        &self.task.run
    }

    /// Create a run named `name` under this task's `subruns/` directory.
    ///
    /// The returned handle records this task's run as its parent.
    pub fn create_subrun(&self, name: &str, if_exists: IfExists) -> Result<RunHandle> {
        if !is_single_component(name) {
            return Err(Error::InvalidArgument(format!(
                "subrun name {name:?} must be a single path component"
            ))
            .into());
        }
        let path = subruns_dir(&self.directory()).join(name);
        let subrun = self.task.run.subrun_at(path)?;
        subrun.create_run(if_exists)?;
        debug!(task = %self.task.task_name, subrun = %name, "subrun created");
        Ok(subrun)
    }

    /// End the scope with the body's result.
    ///
    /// The report is written before returning. Errors not in the allowed set
    /// are returned unchanged; allowed ones are swallowed as `Ok(None)`.
    pub fn finish<T>(mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => {
                self.close(ScopeExit::Completed)?;
                Ok(Some(value))
            }
            Err(err) => match self.close(ScopeExit::Errored(&err)) {
                Ok(outcome) if !outcome.propagates() => Ok(None),
                Ok(_) => Err(err),
                Err(report_err) => {
                    error!(error = %report_err, "failed to record task failure");
                    Err(err)
                }
            },
        }
    }

    fn close(&mut self, exit: ScopeExit<'_>) -> Result<TaskOutcome> {
        self.finished = true;
        self.task.state = TaskState::Finalized;

        let outcome = classify(exit, |err| self.task.allowed.matching(err));
        let dir = self.task.directory();
        let written = write_report(&dir, &self.task.task_name, &outcome);

        match &outcome {
            TaskOutcome::Succeeded => info!(task = %self.task.task_name, "task completed"),
            TaskOutcome::Tolerated { allowed_by, .. } => {
                info!(task = %self.task.task_name, allowed_by = %allowed_by, "task ended with allowed error");
            }
            TaskOutcome::Failed(record) => {
                warn!(task = %self.task.task_name, kind = %record.kind, error = %record.message, "task failed");
            }
        }
        written?;
        Ok(outcome)
    }

}

impl Drop for TaskScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let exit = if std::thread::panicking() {
            ScopeExit::Panicked("task body panicked")
        } else {
            ScopeExit::Abandoned
        };
        if let Err(err) = self.close(exit) {
            error!(error = %err, "failed to record unfinished task");
        }
    }
}
