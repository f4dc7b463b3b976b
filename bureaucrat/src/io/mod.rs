//! Filesystem side of runs and tasks.

pub mod backup;
pub mod fs_ops;
pub mod registry;
pub mod report;
