//! Provenance bookkeeping for experiment pipelines.
//!
//! A *run* is a directory marked by `bureaucrat_run_info.txt`. Work inside a
//! run is split into *tasks*, each a subdirectory whose
//! `bureaucrat_task_report.txt` records whether it completed. Tasks may nest
//! further runs (*subruns*) under `<task>/subruns/`, which is how sweeps and
//! repeated measurements are organized.
//!
//! - **[`core`]**: Pure logic (naming checks, layout, ancestry, report text).
//! - **[`io`]**: Filesystem operations (registry, reports, backups).
//!
//! [`RunHandle`] and [`TaskHandle`] combine both into the public workflow:
//!
//! ```no_run
//! use bureaucrat::{IfExists, RunHandle};
//!
//! # fn main() -> anyhow::Result<()> {
//! let run = RunHandle::new("/data/todays_run")?;
//! run.create_run(IfExists::Skip)?;
//! run.handle_task("measure_thing")?.execute(|task| {
//!     std::fs::write(task.directory().join("thing.txt"), "1\n")?;
//!     Ok(())
//! })?;
//! assert!(run.task_succeeded("measure_thing"));
//! # Ok(())
//! # }
//! ```
//!
//! Nothing here is safe against several processes creating or entering the
//! same run or task at once; serialize such access externally.

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod run;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{BureaucratConfig, IfExists, TaskOptions, load_config};
pub use crate::core::naming::flag_unsafe_characters;
pub use error::{Error, Warning};
pub use io::registry::{create_run, delete_subtree, run_exists};
pub use run::RunHandle;
pub use task::{AllowedErrors, TaskHandle, TaskScope, TaskState};
