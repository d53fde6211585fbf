//! Collaborative-sync subsystem

use std::sync::Arc;
use tracing::info;

use crate::hooks::{HookError, TaskHooks};

/// Runs the collaborate hook to completion
pub async fn run_collaborator(hooks: Arc<dyn TaskHooks>) -> Result<(), HookError> {
    info!("Starting collaborative sync");
    hooks.collaborate().await?;
    info!("Collaborative sync finished");
    Ok(())
}
