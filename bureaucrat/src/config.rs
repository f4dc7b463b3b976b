//! Defaults for run creation and task handling, optionally stored as TOML.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::Error;

/// What `create_run` does when the run already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Fail with [`Error::AlreadyExists`].
    #[default]
    Raise,
    /// Delete the existing run tree, then create it fresh.
    Override,
    /// Leave the existing run untouched.
    Skip,
}

impl FromStr for IfExists {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raise" => Ok(IfExists::Raise),
            "override" => Ok(IfExists::Override),
            "skip" => Ok(IfExists::Skip),
            other => Err(Error::InvalidArgument(format!(
                "unknown if_exists policy '{other}' (expected raise, override or skip)"
            ))),
        }
    }
}

impl fmt::Display for IfExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IfExists::Raise => "raise",
            IfExists::Override => "override",
            IfExists::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Per-task behavior applied by `handle_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Empty the task directory when the scope is entered.
    pub drop_old_data: bool,
    /// Copy the invoking source file into the task directory on entry.
    pub backup_invoking_script: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            drop_old_data: true,
            backup_invoking_script: true,
        }
    }
}

/// Project-wide defaults (TOML).
///
/// Missing fields fall back to the defaults of each section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BureaucratConfig {
    /// Collision policy for run creation.
    pub if_exists: IfExists,
    pub task: TaskOptions,
}

/// Read project defaults from a TOML file; a missing file yields the
/// defaults. Pass the result to [`crate::RunHandle::with_config`].
pub fn load_config(path: &Path) -> Result<BureaucratConfig> {
    match fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text)
            .with_context(|| format!("config {} is not valid", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(BureaucratConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("cannot read config {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BureaucratConfig::default());
        assert!(cfg.task.drop_old_data);
        assert!(cfg.task.backup_invoking_script);
        assert_eq!(cfg.if_exists, IfExists::Raise);
    }

    #[test]
    fn full_file_sets_every_field() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bureaucrat.toml");
        fs::write(
            &path,
            "if_exists = \"skip\"\n\n[task]\ndrop_old_data = false\nbackup_invoking_script = true\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(
            cfg,
            BureaucratConfig {
                if_exists: IfExists::Skip,
                task: TaskOptions {
                    drop_old_data: false,
                    backup_invoking_script: true,
                },
            }
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bureaucrat.toml");
        fs::write(&path, "if_exists = \"replace\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("is not valid"), "{err:#}");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bureaucrat.toml");
        fs::write(&path, "if_exists = \"override\"\n\n[task]\nbackup_invoking_script = false\n")
            .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.if_exists, IfExists::Override);
        assert!(cfg.task.drop_old_data);
        assert!(!cfg.task.backup_invoking_script);
    }

    #[test]
    fn unknown_policy_is_invalid_argument() {
        assert_eq!("skip".parse::<IfExists>().expect("parse"), IfExists::Skip);
        let err = "replace".parse::<IfExists>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
