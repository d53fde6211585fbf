//! Child processes of the supervisor

use async_trait::async_trait;
use harvester_core::domain::Subsystem;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// How a child process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited on its own; `code` is `None` when a signal killed it
    Exited { code: Option<i32> },
    /// Stopped by the supervisor
    Terminated,
    /// Could not be waited on
    Lost { reason: String },
}

impl ChildExit {
    /// Whether the exit counts as a crash
    pub fn is_failure(&self) -> bool {
        match self {
            ChildExit::Exited { code } => *code != Some(0),
            ChildExit::Terminated => false,
            ChildExit::Lost { .. } => true,
        }
    }
}

impl std::fmt::Display for ChildExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildExit::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            ChildExit::Exited { code: None } => write!(f, "killed by signal"),
            ChildExit::Terminated => write!(f, "terminated"),
            ChildExit::Lost { reason } => write!(f, "lost: {}", reason),
        }
    }
}

/// A running child the supervisor can wait on and stop
#[async_trait]
pub trait ChildHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Waits for the child to exit; must be cancel safe
    async fn wait(&mut self) -> ChildExit;

    /// Asks the child to stop, killing it when `grace` runs out
    async fn terminate(&mut self, grace: Duration) -> ChildExit;
}

/// Starts one child process per subsystem
pub trait Launcher: Send + Sync {
    fn launch(&self, subsystem: Subsystem) -> std::io::Result<Box<dyn ChildHandle>>;
}

/// Child backed by an OS process
pub struct OsChild {
    child: Child,
}

impl OsChild {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    #[cfg(unix)]
    fn request_stop(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = self.child.id()
            && let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        {
            warn!(pid, "Failed to send SIGTERM: {}", e);
        }
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to stop child: {}", e);
        }
    }
}

#[async_trait]
impl ChildHandle for OsChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> ChildExit {
        match self.child.wait().await {
            Ok(status) => ChildExit::Exited {
                code: status.code(),
            },
            Err(e) => ChildExit::Lost {
                reason: e.to_string(),
            },
        }
    }

    async fn terminate(&mut self, grace: Duration) -> ChildExit {
        self.request_stop();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(_)) => ChildExit::Terminated,
            Ok(Err(e)) => ChildExit::Lost {
                reason: e.to_string(),
            },
            Err(_) => {
                warn!(pid = ?self.child.id(), "Child ignored SIGTERM for {:?}, killing", grace);
                match self.child.kill().await {
                    Ok(()) => ChildExit::Terminated,
                    Err(e) => ChildExit::Lost {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

/// Launches subsystems by re-running the current executable
///
/// Each child runs `<exe> [--config PATH] subsystem <name>` and inherits the
/// parent's stdio and environment.
#[derive(Debug, Clone)]
pub struct SelfExecLauncher {
    exe: PathBuf,
    config_path: Option<PathBuf>,
    server_args: Vec<String>,
}

impl SelfExecLauncher {
    pub fn new(config_path: Option<PathBuf>) -> std::io::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
            config_path,
            server_args: Vec::new(),
        })
    }

    /// Host and port overrides forwarded to the server child
    pub fn with_server_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server_args.extend(["--host".to_string(), host]);
        }
        if let Some(port) = port {
            self.server_args.extend(["--port".to_string(), port.to_string()]);
        }
        self
    }

    /// Arguments of the child command line
    pub fn args(&self, subsystem: Subsystem) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args.push("subsystem".to_string());
        args.push(subsystem.as_str().to_string());
        if subsystem == Subsystem::Server {
            args.extend(self.server_args.iter().cloned());
        }
        args
    }
}

impl Launcher for SelfExecLauncher {
    fn launch(&self, subsystem: Subsystem) -> std::io::Result<Box<dyn ChildHandle>> {
        let args = self.args(subsystem);
        debug!(%subsystem, "Launching {} {:?}", self.exe.display(), args);

        let child = Command::new(&self.exe)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Box::new(OsChild::new(child)))
    }
}
