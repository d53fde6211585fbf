//! Collection dispatch

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::JobAction;
use crate::hooks::{DispatchOptions, TaskHooks};

/// Dispatches collection for every crawler class
///
/// Classes start in configured order; at most `concurrency` of them run at
/// the same time.
pub struct CollectAll {
    classes: Vec<String>,
    hooks: Arc<dyn TaskHooks>,
    options: DispatchOptions,
    semaphore: Arc<Semaphore>,
}

impl CollectAll {
    pub fn new(
        classes: Vec<String>,
        hooks: Arc<dyn TaskHooks>,
        options: DispatchOptions,
        concurrency: usize,
    ) -> Self {
        Self {
            classes,
            hooks,
            options,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }
}

#[async_trait]
impl JobAction for CollectAll {
    fn name(&self) -> &str {
        "collector"
    }

    async fn run(&self) -> Result<()> {
        let mut tasks = JoinSet::new();

        for class in &self.classes {
            let permit = self.semaphore.clone().acquire_owned().await?;
            let hooks = Arc::clone(&self.hooks);
            let class = class.clone();
            let options = self.options;

            tasks.spawn(async move {
                debug!(class = %class, "Dispatching collection");
                let result = hooks.collect(&class, options).await;
                drop(permit);
                (class, result)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((class, Err(e))) => {
                    error!(class = %class, "Collection failed: {}", e);
                    failed.push(class);
                }
                Err(e) => error!("Collection task panicked: {}", e),
            }
        }

        if !failed.is_empty() {
            anyhow::bail!(
                "collection failed for {} of {} crawler class(es): {}",
                failed.len(),
                self.classes.len(),
                failed.join(", ")
            );
        }

        info!("Dispatched collection for {} crawler class(es)", self.classes.len());
        Ok(())
    }
}
