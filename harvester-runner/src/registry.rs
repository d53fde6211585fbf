//! Job registry
//!
//! Maps every job kind to the action that runs it. The mapping is an
//! exhaustive match, so adding a job kind without an action does not compile.

use harvester_core::Config;
use harvester_core::domain::JobKind;
use harvester_ledger::FreshnessLedger;
use std::sync::Arc;

use crate::actions::{CollectAll, DecoupleSubscriptions, JobAction, OverdueSweep};
use crate::hooks::{DispatchOptions, TaskHooks};

pub struct JobRegistry {
    collector: Arc<dyn JobAction>,
    decouple: Arc<dyn JobAction>,
    overdue: Arc<dyn JobAction>,
}

impl JobRegistry {
    /// Builds the actions for one timed-task process
    pub fn new(config: &Config, ledger: FreshnessLedger, hooks: Arc<dyn TaskHooks>) -> Self {
        let classes = config.crawler_sequence.clone();

        Self {
            collector: Arc::new(CollectAll::new(
                classes.clone(),
                Arc::clone(&hooks),
                DispatchOptions::default(),
                config.deploy.collector_concurrency,
            )),
            decouple: Arc::new(DecoupleSubscriptions::new(
                Arc::clone(&hooks),
                false,
                config.maintenance.decouple_power,
            )),
            overdue: Arc::new(OverdueSweep::new(ledger, classes)),
        }
    }

    pub fn action(&self, kind: JobKind) -> Arc<dyn JobAction> {
        match kind {
            JobKind::Collector => Arc::clone(&self.collector),
            JobKind::DdtDecouple => Arc::clone(&self.decouple),
            JobKind::DdtOverdue => Arc::clone(&self.overdue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHooks, memory_ledger};

    #[test]
    fn test_every_kind_has_a_matching_action() {
        let (_, ledger) = memory_ledger();
        let registry = JobRegistry::new(
            &Config::default(),
            ledger,
            Arc::new(RecordingHooks::default()),
        );

        for kind in JobKind::ALL {
            assert_eq!(registry.action(kind).name(), kind.as_str());
        }
    }

    #[tokio::test]
    async fn test_decouple_uses_configured_power() {
        let mut config = Config::default();
        config.maintenance.decouple_power = 4;

        let (_, ledger) = memory_ledger();
        let hooks = Arc::new(RecordingHooks::default());
        let registry = JobRegistry::new(&config, ledger, hooks.clone());

        registry.action(JobKind::DdtDecouple).run().await.unwrap();
        assert_eq!(hooks.calls(), vec!["decouple:false:4"]);
    }
}
