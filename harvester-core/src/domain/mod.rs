//! Core domain types
//!
//! Structures shared between the supervisor (which decides what runs) and
//! the subsystems (which run it).

pub mod job;
pub mod subsystem;

pub use job::{JobKind, JobSpec};
pub use subsystem::{RestartPolicy, Subsystem};
