//! External job hooks
//!
//! Collection, subscription cleanup, distribution and collaborative sync are
//! owned by other programs. The runner only decides when they run; each one
//! is invoked as a configured command.

use async_trait::async_trait;
use harvester_core::config::HookConfig;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// The external routines the runner can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Collect,
    Decouple,
    Distribute,
    Collaborate,
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Collect => write!(f, "collect"),
            Hook::Decouple => write!(f, "decouple"),
            Hook::Distribute => write!(f, "distribute"),
            Hook::Collaborate => write!(f, "collaborate"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hooks.{0} is not configured")]
    NotConfigured(Hook),

    #[error("failed to start {hook} hook: {source}")]
    Spawn {
        hook: Hook,
        #[source]
        source: std::io::Error,
    },

    #[error("{hook} hook exited with {status}")]
    Failed { hook: Hook, status: ExitStatus },
}

/// Options forwarded to every collection dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Dispatch in a single synchronized pass
    pub beat_sync: bool,
    /// Dispatch even if the crawler class is considered fresh
    pub force_run: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            beat_sync: true,
            force_run: false,
        }
    }
}

/// Entry points of the external routines
///
/// Trait-based so schedulers and run modes can be exercised without
/// spawning processes.
#[async_trait]
pub trait TaskHooks: Send + Sync {
    /// Whether `hook` can be invoked at all
    fn is_configured(&self, hook: Hook) -> bool;

    /// Collects one crawler class
    async fn collect(&self, class: &str, options: DispatchOptions) -> Result<(), HookError>;

    /// Runs the subscription cleanup routine with `power` work units
    async fn decouple(&self, debug: bool, power: u32) -> Result<(), HookError>;

    /// Runs the secondary distribution step
    async fn distribute(&self) -> Result<(), HookError>;

    /// Runs the collaborative-sync routine
    async fn collaborate(&self) -> Result<(), HookError>;
}

/// Hooks backed by the commands in `[hooks]`
#[derive(Debug, Clone)]
pub struct CommandHooks {
    config: HookConfig,
}

impl CommandHooks {
    pub fn new(config: HookConfig) -> Self {
        Self { config }
    }

    fn argv(&self, hook: Hook) -> Option<&Vec<String>> {
        match hook {
            Hook::Collect => self.config.collect.as_ref(),
            Hook::Decouple => self.config.decouple.as_ref(),
            Hook::Distribute => self.config.distribute.as_ref(),
            Hook::Collaborate => self.config.collaborate.as_ref(),
        }
    }

    async fn run(&self, hook: Hook, vars: &[(&str, String)]) -> Result<(), HookError> {
        let argv: Vec<String> = self
            .argv(hook)
            .ok_or(HookError::NotConfigured(hook))?
            .iter()
            .map(|arg| substitute(arg, vars))
            .collect();
        let (program, args) = argv.split_first().ok_or(HookError::NotConfigured(hook))?;

        debug!(%hook, "Running {} {:?}", program, args);

        let status = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| HookError::Spawn { hook, source })?;

        if !status.success() {
            return Err(HookError::Failed { hook, status });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskHooks for CommandHooks {
    fn is_configured(&self, hook: Hook) -> bool {
        self.argv(hook).is_some()
    }

    async fn collect(&self, class: &str, options: DispatchOptions) -> Result<(), HookError> {
        self.run(
            Hook::Collect,
            &[
                ("class", class.to_string()),
                ("beat_sync", options.beat_sync.to_string()),
                ("force_run", options.force_run.to_string()),
            ],
        )
        .await
    }

    async fn decouple(&self, debug: bool, power: u32) -> Result<(), HookError> {
        self.run(
            Hook::Decouple,
            &[("debug", debug.to_string()), ("power", power.to_string())],
        )
        .await
    }

    async fn distribute(&self) -> Result<(), HookError> {
        self.run(Hook::Distribute, &[]).await
    }

    async fn collaborate(&self) -> Result<(), HookError> {
        self.run(Hook::Collaborate, &[]).await
    }
}

/// Replaces every `{name}` placeholder in `arg`
fn substitute(arg: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(arg.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Option<Vec<String>> {
        Some(parts.iter().map(|part| part.to_string()).collect())
    }

    #[test]
    fn test_substitute() {
        let vars = [("class", "v2ray".to_string()), ("power", "12".to_string())];
        assert_eq!(substitute("--class={class}", &vars), "--class=v2ray");
        assert_eq!(substitute("{power}/{power}", &vars), "12/12");
        assert_eq!(substitute("{unknown}", &vars), "{unknown}");
    }

    #[tokio::test]
    async fn test_unconfigured_hook() {
        let hooks = CommandHooks::new(HookConfig::default());
        assert!(!hooks.is_configured(Hook::Distribute));

        let err = hooks.distribute().await.unwrap_err();
        assert!(matches!(err, HookError::NotConfigured(Hook::Distribute)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_collect_substitutes_and_checks_status() {
        let hooks = CommandHooks::new(HookConfig {
            collect: argv(&["sh", "-c", "test \"$0\" = v2ray", "{class}"]),
            ..HookConfig::default()
        });

        assert!(hooks.collect("v2ray", DispatchOptions::default()).await.is_ok());

        let err = hooks
            .collect("ssr", DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Failed { hook: Hook::Collect, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_decouple_receives_power() {
        let hooks = CommandHooks::new(HookConfig {
            decouple: argv(&["sh", "-c", "test \"$0\" = 8 && test \"$1\" = true", "{power}", "{debug}"]),
            ..HookConfig::default()
        });

        assert!(hooks.decouple(true, 8).await.is_ok());
        assert!(hooks.decouple(false, 8).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let hooks = CommandHooks::new(HookConfig {
            collaborate: argv(&["/nonexistent/harvester-hook"]),
            ..HookConfig::default()
        });

        let err = hooks.collaborate().await.unwrap_err();
        assert!(matches!(err, HookError::Spawn { .. }));
    }
}
