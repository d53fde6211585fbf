//! Harvester Runner
//!
//! Everything that runs jobs: the job actions, the scheduling lanes of the
//! timed-task subsystem, the one-shot immediate mode and the process
//! supervisor that keeps the subsystems alive.
//!
//! Architecture:
//! - Hooks: external commands that own collection and cleanup
//! - Actions: the behaviour behind each job kind
//! - Registry: job kind to action mapping
//! - Scheduler: cadence lanes for housekeeping jobs and collection
//! - Supervisor: one OS child process per enabled subsystem

pub mod actions;
pub mod collaborator;
pub mod hooks;
pub mod immediate;
pub mod registry;
pub mod scheduler;
pub mod supervisor;
pub mod timed;

pub use hooks::{CommandHooks, DispatchOptions, Hook, HookError, TaskHooks};
pub use immediate::{RunReport, run_immediate};
pub use registry::JobRegistry;
pub use supervisor::{Outcome, ProcessSupervisor, SupervisorReport};
pub use timed::{TimedTaskError, TimedTasks};
