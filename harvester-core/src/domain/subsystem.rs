//! Supervised subsystem types

use serde::{Deserialize, Serialize};

/// A subsystem the supervisor runs in its own OS process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subsystem {
    /// Recurring jobs (collector lane plus maintenance jobs)
    TimedTasks,
    /// HTTP status server
    Server,
    /// Collaborative-sync runner
    Collaborator,
}

impl Subsystem {
    /// Name used on the child command line and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::TimedTasks => "timed-tasks",
            Subsystem::Server => "server",
            Subsystem::Collaborator => "collaborator",
        }
    }

    /// Subsystems enabled by the three independent flags, in spawn order
    pub fn enabled(timed_tasks: bool, server: bool, collaborator: bool) -> Vec<Subsystem> {
        [
            (timed_tasks, Subsystem::TimedTasks),
            (server, Subsystem::Server),
            (collaborator, Subsystem::Collaborator),
        ]
        .into_iter()
        .filter_map(|(on, subsystem)| on.then_some(subsystem))
        .collect()
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the supervisor does when a child exits unsuccessfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RestartPolicy {
    /// A crashed child stays down
    #[default]
    Never,
    /// Relaunch a failed child, at most `max_restarts` times
    OnFailure { max_restarts: u32 },
}

impl RestartPolicy {
    /// Whether a child that has already been restarted `restarts` times may be relaunched
    pub fn allows_restart(&self, restarts: u32) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure { max_restarts } => restarts < *max_restarts,
        }
    }
}
