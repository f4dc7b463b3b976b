//! Deterministic, pure logic shared by the run and task handles.
//!
//! Core modules must be free of I/O side effects. They operate on paths,
//! strings and in-memory values and return deterministic outputs suitable for
//! tests.

pub mod layout;
pub mod lineage;
pub mod naming;
pub mod outcome;
