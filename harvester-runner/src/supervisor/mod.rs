//! Process supervisor
//!
//! Runs every enabled subsystem in its own OS process and waits for all of
//! them. On SIGINT/SIGTERM every child still running is terminated before
//! the supervisor returns.
//!
//! Each child gets a watcher task. The watcher waits on the child, applies
//! the restart policy when it crashes and terminates it when the stop
//! signal is raised.

mod child;
mod signal;

pub use child::{ChildExit, ChildHandle, Launcher, OsChild, SelfExecLauncher};
pub use signal::shutdown_signal;

use harvester_core::domain::{RestartPolicy, Subsystem};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Pause before relaunching a crashed child
///
/// A terminal Ctrl+C reaches the children before the supervisor, so a child
/// can die of it before the stop signal is raised.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// How a supervisor run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every child exited on its own
    Completed,
    /// A shutdown signal stopped the run
    Interrupted,
    /// A subsystem could not be started
    Failed(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Interrupted => write!(f, "interrupted"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Final state of one supervised child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    pub subsystem: Subsystem,
    pub exit: ChildExit,
    pub restarts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Subsystems that were started, in spawn order
    pub spawned: Vec<Subsystem>,
    /// Children in the order they finished
    pub children: Vec<ChildRecord>,
    pub outcome: Outcome,
}

impl SupervisorReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }
}

pub struct ProcessSupervisor {
    launcher: Arc<dyn Launcher>,
    policy: RestartPolicy,
    grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(launcher: Arc<dyn Launcher>, policy: RestartPolicy, grace: Duration) -> Self {
        Self {
            launcher,
            policy,
            grace,
        }
    }

    /// Starts `subsystems` and runs until every child is gone
    ///
    /// `shutdown` resolving terminates all children. A spawn failure
    /// terminates the children already started and fails the run.
    pub async fn run(
        &self,
        subsystems: &[Subsystem],
        shutdown: impl Future<Output = ()>,
    ) -> SupervisorReport {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut watchers = JoinSet::new();
        let mut spawned = Vec::new();
        let mut failure = None;

        for &subsystem in subsystems {
            match self.launcher.launch(subsystem) {
                Ok(child) => {
                    info!(%subsystem, pid = ?child.id(), "Spawned subsystem");
                    spawned.push(subsystem);
                    watchers.spawn(watch_child(
                        subsystem,
                        child,
                        Arc::clone(&self.launcher),
                        self.policy,
                        self.grace,
                        stop_rx.clone(),
                    ));
                }
                Err(e) => {
                    error!(%subsystem, "Failed to spawn subsystem: {}", e);
                    failure = Some(format!("failed to spawn {}: {}", subsystem, e));
                    break;
                }
            }
        }

        if failure.is_some() {
            let _ = stop_tx.send(true);
        }

        tokio::pin!(shutdown);
        let mut interrupted = false;
        let mut children = Vec::new();

        loop {
            tokio::select! {
                joined = watchers.join_next() => match joined {
                    Some(Ok(record)) => children.push(record),
                    Some(Err(e)) => error!("Child watcher panicked: {}", e),
                    None => break,
                },
                _ = &mut shutdown, if !interrupted && failure.is_none() => {
                    warn!("Shutdown requested, terminating {} subsystem(s)", watchers.len());
                    interrupted = true;
                    let _ = stop_tx.send(true);
                }
            }
        }

        let outcome = match failure {
            Some(reason) => Outcome::Failed(reason),
            None if interrupted => Outcome::Interrupted,
            None => Outcome::Completed,
        };
        info!(%outcome, children = children.len(), "All subsystems finished");

        SupervisorReport {
            spawned,
            children,
            outcome,
        }
    }
}

async fn watch_child(
    subsystem: Subsystem,
    mut child: Box<dyn ChildHandle>,
    launcher: Arc<dyn Launcher>,
    policy: RestartPolicy,
    grace: Duration,
    mut stop: watch::Receiver<bool>,
) -> ChildRecord {
    let mut restarts = 0;

    loop {
        let exited = if *stop.borrow_and_update() {
            None
        } else {
            tokio::select! {
                exit = child.wait() => Some(exit),
                _ = stop.changed() => None,
            }
        };

        let Some(exit) = exited else {
            info!(%subsystem, "Terminating subsystem");
            let exit = child.terminate(grace).await;
            info!(%subsystem, %exit, "Subsystem stopped");
            return ChildRecord {
                subsystem,
                exit,
                restarts,
            };
        };

        if exit.is_failure() && policy.allows_restart(restarts) && !stop_raised(&mut stop).await {
            warn!(%subsystem, %exit, restart = restarts + 1, "Subsystem crashed, restarting");
            match launcher.launch(subsystem) {
                Ok(next) => {
                    child = next;
                    restarts += 1;
                    continue;
                }
                Err(e) => error!(%subsystem, "Failed to restart subsystem: {}", e),
            }
        } else if exit.is_failure() {
            error!(%subsystem, %exit, "Subsystem crashed");
        } else {
            info!(%subsystem, %exit, "Subsystem exited");
        }

        return ChildRecord {
            subsystem,
            exit,
            restarts,
        };
    }
}

/// Waits out [`RESTART_DELAY`], reporting whether stop was raised meanwhile
async fn stop_raised(stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow_and_update() {
        return true;
    }
    tokio::select! {
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
        _ = tokio::time::sleep(RESTART_DELAY) => *stop.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Script {
        ExitAfter(Duration, i32),
        Forever,
    }

    struct FakeChild {
        subsystem: Subsystem,
        script: Script,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChildHandle for FakeChild {
        fn id(&self) -> Option<u32> {
            None
        }

        async fn wait(&mut self) -> ChildExit {
            match self.script {
                Script::ExitAfter(delay, code) => {
                    tokio::time::sleep(delay).await;
                    ChildExit::Exited { code: Some(code) }
                }
                Script::Forever => std::future::pending().await,
            }
        }

        async fn terminate(&mut self, _grace: Duration) -> ChildExit {
            self.log
                .lock()
                .unwrap()
                .push(format!("terminate:{}", self.subsystem));
            ChildExit::Terminated
        }
    }

    /// Launcher handing out scripted children; unscripted launches run forever
    #[derive(Default)]
    struct FakeLauncher {
        scripts: Mutex<HashMap<Subsystem, VecDeque<Script>>>,
        failing: Option<Subsystem>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeLauncher {
        fn script(self, subsystem: Subsystem, scripts: &[Script]) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(subsystem, scripts.iter().copied().collect());
            self
        }

        fn failing(mut self, subsystem: Subsystem) -> Self {
            self.failing = Some(subsystem);
            self
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn launches(&self, subsystem: Subsystem) -> usize {
            let launched = format!("launch:{}", subsystem);
            self.log().iter().filter(|entry| **entry == launched).count()
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(&self, subsystem: Subsystem) -> std::io::Result<Box<dyn ChildHandle>> {
            if self.failing == Some(subsystem) {
                return Err(std::io::Error::other("no such executable"));
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("launch:{}", subsystem));

            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&subsystem)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Script::Forever);

            Ok(Box::new(FakeChild {
                subsystem,
                script,
                log: Arc::clone(&self.log),
            }))
        }
    }

    fn supervisor(launcher: Arc<FakeLauncher>, policy: RestartPolicy) -> ProcessSupervisor {
        ProcessSupervisor::new(launcher, policy, Duration::from_secs(5))
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_every_child() {
        let launcher = Arc::new(
            FakeLauncher::default()
                .script(Subsystem::TimedTasks, &[Script::ExitAfter(SECOND * 2, 0)])
                .script(Subsystem::Collaborator, &[Script::ExitAfter(SECOND, 0)]),
        );

        let report = supervisor(launcher.clone(), RestartPolicy::Never)
            .run(
                &[Subsystem::TimedTasks, Subsystem::Collaborator],
                std::future::pending(),
            )
            .await;

        assert_eq!(
            report.spawned,
            vec![Subsystem::TimedTasks, Subsystem::Collaborator]
        );
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.children.len(), 2);
        assert_eq!(report.children[0].subsystem, Subsystem::Collaborator);
        assert!(report.children.iter().all(|child| !child.exit.is_failure()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_terminates_every_child() {
        let launcher = Arc::new(FakeLauncher::default());

        let report = supervisor(launcher.clone(), RestartPolicy::Never)
            .run(
                &[Subsystem::TimedTasks, Subsystem::Server, Subsystem::Collaborator],
                tokio::time::sleep(SECOND),
            )
            .await;

        assert_eq!(report.outcome, Outcome::Interrupted);
        assert_eq!(report.children.len(), 3);
        assert!(
            report
                .children
                .iter()
                .all(|child| child.exit == ChildExit::Terminated)
        );

        let terminated = launcher
            .log()
            .into_iter()
            .filter(|entry| entry.starts_with("terminate:"))
            .count();
        assert_eq!(terminated, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_stops_started_children() {
        let launcher = Arc::new(FakeLauncher::default().failing(Subsystem::Server));

        let report = supervisor(launcher.clone(), RestartPolicy::Never)
            .run(
                &[Subsystem::TimedTasks, Subsystem::Server, Subsystem::Collaborator],
                std::future::pending(),
            )
            .await;

        assert!(matches!(report.outcome, Outcome::Failed(_)));
        assert!(!report.is_success());
        assert_eq!(report.spawned, vec![Subsystem::TimedTasks]);
        assert_eq!(launcher.log(), vec!["launch:timed-tasks", "terminate:timed-tasks"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_child_stays_down_without_restart_policy() {
        let launcher = Arc::new(
            FakeLauncher::default().script(Subsystem::Server, &[Script::ExitAfter(SECOND, 1)]),
        );

        let report = supervisor(launcher.clone(), RestartPolicy::Never)
            .run(&[Subsystem::Server], std::future::pending())
            .await;

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.children[0].exit, ChildExit::Exited { code: Some(1) });
        assert_eq!(launcher.launches(Subsystem::Server), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_child_is_restarted_up_to_the_limit() {
        let crash = Script::ExitAfter(SECOND, 1);
        let launcher = Arc::new(
            FakeLauncher::default().script(Subsystem::TimedTasks, &[crash, crash, crash]),
        );

        let report = supervisor(launcher.clone(), RestartPolicy::OnFailure { max_restarts: 2 })
            .run(&[Subsystem::TimedTasks], std::future::pending())
            .await;

        assert_eq!(launcher.launches(Subsystem::TimedTasks), 3);
        assert_eq!(report.children[0].restarts, 2);
        assert!(report.children[0].exit.is_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_lost_to_interrupt_is_not_restarted() {
        // the child dies of the same SIGINT just before the supervisor sees it
        let launcher = Arc::new(
            FakeLauncher::default().script(Subsystem::Server, &[Script::ExitAfter(SECOND, 1)]),
        );

        let report = supervisor(launcher.clone(), RestartPolicy::OnFailure { max_restarts: 3 })
            .run(
                &[Subsystem::Server],
                tokio::time::sleep(SECOND + Duration::from_millis(500)),
            )
            .await;

        assert_eq!(report.outcome, Outcome::Interrupted);
        assert_eq!(launcher.launches(Subsystem::Server), 1);
        assert_eq!(report.children[0].exit, ChildExit::Exited { code: Some(1) });
        assert_eq!(report.children[0].restarts, 0);
        assert!(!launcher.log().iter().any(|entry| entry.starts_with("terminate:")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_exit_is_not_restarted() {
        let launcher = Arc::new(
            FakeLauncher::default()
                .script(Subsystem::Collaborator, &[Script::ExitAfter(SECOND, 0)]),
        );

        let report = supervisor(launcher.clone(), RestartPolicy::OnFailure { max_restarts: 3 })
            .run(&[Subsystem::Collaborator], std::future::pending())
            .await;

        assert_eq!(launcher.launches(Subsystem::Collaborator), 1);
        assert_eq!(report.children[0].restarts, 0);
    }

    #[tokio::test]
    async fn test_nothing_to_supervise() {
        let launcher = Arc::new(FakeLauncher::default());
        let report = supervisor(launcher, RestartPolicy::Never)
            .run(&[], std::future::pending())
            .await;

        assert!(report.spawned.is_empty());
        assert_eq!(report.outcome, Outcome::Completed);
    }
}
