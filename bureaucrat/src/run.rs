//! Handle on a run directory: creation, navigation and task queries.

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::{BureaucratConfig, IfExists, TaskOptions};
use crate::core::layout::{marker_path, subruns_dir, task_dir};
use crate::core::lineage::{join_pseudopath, structural_parent};
use crate::core::naming::{check_naming, is_single_component};
use crate::error::Error;
use crate::io::registry::{create_run, delete_subtree};
use crate::io::report::report_says_success;
use crate::task::TaskHandle;

/// A run at a given path, which may or may not exist yet.
///
/// The last path component is the run name. All queries read the filesystem
/// each time; nothing about the run's state is cached in the handle. The
/// handle's [`BureaucratConfig`] supplies the collision policy for
/// [`RunHandle::create_run_configured`] and the options for
/// [`RunHandle::handle_task`]; handles derived from this one (parent, subruns)
/// carry the same config.
#[derive(Debug, Clone)]
pub struct RunHandle {
    path: PathBuf,
    name: String,
    /// Parent run recorded when this handle was made by `create_subrun`.
    recorded_parent: Option<PathBuf>,
    config: BureaucratConfig,
    scratch: Arc<OnceLock<TempDir>>,
}

impl RunHandle {
    /// Handle on the run at `path`.
    ///
    /// Fails with [`Error::InvalidArgument`] if `path` has no final name
    /// component (e.g. `/` or `..`).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .ok_or_else(|| {
                Error::InvalidArgument(format!("run path {} has no run name", path.display()))
            })?
            .to_string_lossy()
            .into_owned();
        Ok(Self {
            path,
            name,
            recorded_parent: None,
            config: BureaucratConfig::default(),
            scratch: Arc::new(OnceLock::new()),
        })
    }

    /// Use `config` for this handle and every handle derived from it.
    pub fn with_config(mut self, config: BureaucratConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BureaucratConfig {
        &self.config
    }

    /// Handle on `path` sharing this handle's config.
    fn derived(&self, path: PathBuf) -> Result<RunHandle> {
        Ok(RunHandle::new(path)?.with_config(self.config.clone()))
    }

    /// Handle on the subrun at `path` whose parent is this run.
    pub(crate) fn subrun_at(&self, path: PathBuf) -> Result<RunHandle> {
        let mut handle = self.derived(path)?;
        handle.recorded_parent = Some(self.path.clone());
        Ok(handle)
    }

    /// Directory of the run.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// True iff the run's marker file is present.
    pub fn exists(&self) -> bool {
        marker_path(&self.path).is_file()
    }

    /// Create the run according to the collision policy.
    pub fn create_run(&self, if_exists: IfExists) -> Result<()> {
        if self.exists() {
            match if_exists {
                IfExists::Raise => {
                    return Err(Error::AlreadyExists {
                        parent: self.parent_dir().to_path_buf(),
                        name: self.name.clone(),
                    }
                    .into());
                }
                IfExists::Skip => {
                    debug!(path = %self.path.display(), "run exists, skipping creation");
                    return Ok(());
                }
                IfExists::Override => {
                    info!(path = %self.path.display(), "overriding existing run");
                    delete_subtree(&self.path)?;
                }
            }
        }
        create_run(self.parent_dir(), &self.name)?;
        Ok(())
    }

    /// Create the run with the collision policy from the handle's config.
    pub fn create_run_configured(&self) -> Result<()> {
        self.create_run(self.config.if_exists)
    }

    /// The run this one is a subrun of, if that run exists.
    pub fn parent(&self) -> Option<RunHandle> {
        let parent_path = match &self.recorded_parent {
            Some(recorded) => recorded.clone(),
            None => structural_parent(&self.path)?.to_path_buf(),
        };
        let parent = self.derived(parent_path).ok()?;
        parent.exists().then_some(parent)
    }

    /// Run names from the root run down to this one, joined with `/`.
    ///
    /// `None` if this run does not exist.
    pub fn pseudopath(&self) -> Option<String> {
        if !self.exists() {
            return None;
        }
        let mut names = vec![self.name.clone()];
        let mut current = self.parent();
        while let Some(run) = current {
            names.push(run.name.clone());
            current = run.parent();
        }
        names.reverse();
        Some(join_pseudopath(names))
    }

    /// Directory of `task_name` in this run. The task need not exist.
    pub fn path_to_task_directory(&self, task_name: &str) -> PathBuf {
        task_dir(&self.path, task_name)
    }

    /// Subruns created under `task_name`, sorted by name.
    ///
    /// Empty if the task has no `subruns` directory. Non-directory entries are
    /// ignored.
    pub fn list_subruns(&self, task_name: &str) -> Result<Vec<RunHandle>> {
        let dir = subruns_dir(&self.path_to_task_directory(task_name));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut subruns = Vec::new();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("read subruns {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let path = entry.path();
            if path.is_dir() {
                subruns.push(self.derived(path)?);
            }
        }
        subruns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subruns)
    }

    /// True iff `task_name` has a report whose first line is the success
    /// sentinel. Never fails.
    pub fn task_succeeded(&self, task_name: &str) -> bool {
        report_says_success(&self.path_to_task_directory(task_name))
    }

    /// Check that every task in `names` succeeded.
    ///
    /// With `raise_on_failure`, any missing or failed task yields
    /// [`Error::TaskNotCompleted`] listing exactly those tasks. Otherwise
    /// returns whether all succeeded.
    pub fn require_tasks_succeeded<I, S>(&self, names: I, raise_on_failure: bool) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let failed: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .filter(|name| !self.task_succeeded(name))
            .collect();
        if failed.is_empty() {
            return Ok(true);
        }
        if raise_on_failure {
            return Err(Error::TaskNotCompleted {
                failed,
                run: self.pseudopath().unwrap_or_else(|| self.name.clone()),
                path: self.path.clone(),
            }
            .into());
        }
        Ok(false)
    }

    /// Task handle for `task_name` with the task options of the handle's
    /// config.
    ///
    /// The source file containing this call is the one backed up into the
    /// task directory.
    #[track_caller]
    pub fn handle_task(&self, task_name: &str) -> Result<TaskHandle> {
        self.handle_task_with(task_name, self.config.task)
    }

    /// Task handle for `task_name` with explicit options.
    ///
    /// Fails with [`Error::NotARun`] if this run does not exist and with
    /// [`Error::InvalidArgument`] unless the task name is a single normal path
    /// component.
    #[track_caller]
    pub fn handle_task_with(&self, task_name: &str, options: TaskOptions) -> Result<TaskHandle> {
        let invoking_file = PathBuf::from(Location::caller().file());
        if !is_single_component(task_name) {
            return Err(Error::InvalidArgument(format!(
                "task name {task_name:?} must be a single path component"
            ))
            .into());
        }
        if !self.exists() {
            return Err(Error::NotARun {
                path: self.path.clone(),
            }
            .into());
        }
        let mut task = TaskHandle::new(self.clone(), task_name, options, invoking_file);
        if let Some(warning) = check_naming(task_name) {
            task.record_warning(warning.emit());
        }
        Ok(task)
    }

    /// Scratch directory for this handle, created on first use and removed
    /// when the last clone of the handle is dropped.
    pub fn temporary_directory(&self) -> Result<&Path> {
        if self.scratch.get().is_none() {
            let dir = tempfile::Builder::new()
                .prefix("bureaucrat-")
                .tempdir()
                .context("create temporary directory")?;
            debug!(run = %self.name, path = %dir.path().display(), "temporary directory created");
            let _ = self.scratch.set(dir);
        }
        self.scratch
            .get()
            .map(TempDir::path)
            .ok_or_else(|| anyhow!("temporary directory for run '{}' unavailable", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::report_path;

    #[test]
    fn new_rejects_paths_without_name() {
        let err = RunHandle::new("/").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidArgument(_))
        ));
        assert!(RunHandle::new("..").is_err());
        assert_eq!(RunHandle::new("data/run").expect("handle").name(), "run");
    }

    #[test]
    fn override_replaces_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");
        fs::write(run.path().join("old.txt"), "old").expect("write");

        run.create_run(IfExists::Override).expect("override");
        assert!(run.exists());
        assert!(!run.path().join("old.txt").exists());
    }

    #[test]
    fn skip_leaves_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");
        fs::write(run.path().join("old.txt"), "old").expect("write");

        run.create_run(IfExists::Skip).expect("skip");
        assert!(run.path().join("old.txt").exists());
    }

    #[test]
    fn pseudopath_is_none_for_missing_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        assert_eq!(run.pseudopath(), None);
        run.create_run(IfExists::Raise).expect("create");
        assert_eq!(run.pseudopath().as_deref(), Some("run"));
    }

    #[test]
    fn structural_parent_requires_existing_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sub_path = temp.path().join("root/task/subruns/child");
        let child = RunHandle::new(&sub_path).expect("handle");
        child.create_run(IfExists::Raise).expect("create child");

        // `root` is only a directory, not a run.
        assert!(child.parent().is_none());
        assert_eq!(child.pseudopath().as_deref(), Some("child"));

        let root = RunHandle::new(temp.path().join("root")).expect("handle");
        root.create_run(IfExists::Raise).expect("create root");
        let parent = child.parent().expect("parent");
        assert_eq!(parent.path(), root.path());
        assert_eq!(child.pseudopath().as_deref(), Some("root/child"));
    }

    #[test]
    fn list_subruns_ignores_files_and_sorts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");
        assert!(run.list_subruns("task").expect("list").is_empty());

        let subruns = subruns_dir(&run.path_to_task_directory("task"));
        fs::create_dir_all(subruns.join("b")).expect("mkdir");
        fs::create_dir_all(subruns.join("a")).expect("mkdir");
        fs::write(subruns.join("notes.txt"), "").expect("write");

        let names: Vec<String> = run
            .list_subruns("task")
            .expect("list")
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn task_succeeded_is_false_without_report() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        assert!(!run.task_succeeded("never"));

        run.create_run(IfExists::Raise).expect("create");
        fs::create_dir_all(run.path_to_task_directory("half")).expect("mkdir");
        assert!(!run.task_succeeded("half"));
        fs::write(report_path(&run.path_to_task_directory("half")), "garbage\n").expect("write");
        assert!(!run.task_succeeded("half"));
    }

    #[test]
    fn require_tasks_reports_only_failed_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");
        let done = run.path_to_task_directory("done");
        fs::create_dir_all(&done).expect("mkdir");
        crate::io::report::write_report(&done, "done", &crate::core::outcome::TaskOutcome::Succeeded)
            .expect("report");

        assert!(run.require_tasks_succeeded(["done"], true).expect("all done"));
        assert!(!run.require_tasks_succeeded(["done", "missing"], false).expect("no raise"));

        let err = run.require_tasks_succeeded(["done", "missing"], true).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::TaskNotCompleted { failed, run, .. }) => {
                assert_eq!(failed, &vec!["missing".to_string()]);
                assert_eq!(run, "run");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn handle_task_requires_existing_run_and_valid_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        let err = run.handle_task("t").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotARun { .. })));

        run.create_run(IfExists::Raise).expect("create");
        let err = run.handle_task("").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidArgument(_))
        ));
        assert!(run.handle_task("t").is_ok());
    }

    #[test]
    fn nested_task_names_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("run")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");

        for name in ["stage/measure", "../measure", "/measure"] {
            let err = run.handle_task(name).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<Error>(), Some(Error::InvalidArgument(_))),
                "{name} accepted"
            );
        }
        assert!(!run.path().join("stage").exists());
    }

    /// The pseudopath of a subrun is the same whichever way its handle was
    /// obtained.
    #[test]
    fn subrun_pseudopath_does_not_depend_on_handle_origin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = RunHandle::new(temp.path().join("R")).expect("handle");
        run.create_run(IfExists::Raise).expect("create");

        let mut task = run.handle_task("measure").expect("task");
        let scope = task.enter().expect("enter");
        let created = scope.create_subrun("S1", IfExists::Raise).expect("subrun");
        scope.finish(Ok(())).expect("finish");

        let listed = run.list_subruns("measure").expect("list");
        let rebuilt = RunHandle::new(created.path()).expect("handle");
        assert_eq!(created.pseudopath().as_deref(), Some("R/S1"));
        assert_eq!(listed[0].pseudopath(), created.pseudopath());
        assert_eq!(rebuilt.pseudopath(), created.pseudopath());
    }

    #[test]
    fn config_drives_collision_policy_and_task_options() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = BureaucratConfig {
            if_exists: IfExists::Skip,
            task: TaskOptions {
                drop_old_data: false,
                backup_invoking_script: false,
            },
        };
        let run = RunHandle::new(temp.path().join("run"))
            .expect("handle")
            .with_config(config.clone());
        run.create_run_configured().expect("create");
        run.create_run_configured().expect("skip existing");

        let dir = run.path_to_task_directory("t");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("kept.txt"), "old").expect("write");
        run.handle_task("t")
            .expect("task")
            .execute(|_| Ok(()))
            .expect("execute");
        assert!(dir.join("kept.txt").exists());
        assert!(!dir.join("backup.run.rs").exists());

        fs::create_dir_all(dir.join("subruns/S1")).expect("mkdir subrun");
        let listed = run.list_subruns("t").expect("list");
        assert_eq!(listed[0].config(), &config);
    }

    #[test]
    fn temporary_directory_is_stable_per_handle() {
        let run = RunHandle::new("unused/run").expect("handle");
        let first = run.temporary_directory().expect("tmp").to_path_buf();
        let second = run.temporary_directory().expect("tmp").to_path_buf();
        assert_eq!(first, second);
        assert!(first.is_dir());

        let clone = run.clone();
        drop(run);
        assert!(clone.temporary_directory().expect("tmp").is_dir());
    }
}
