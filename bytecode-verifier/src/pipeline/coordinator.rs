use super::{
    ContractCompiler, ContractStore, PipelineError, PipelineHandler, Summary, VerificationWorker,
};
use crate::{common_types::ContractIdentity, queue, verifier::VerificationEngine};
use serde::Deserialize;
use std::sync::Arc;

/// Workers spawn compiler processes, so the count stays well below the number of cores.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus / 2).clamp(1, 4)
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub workers: usize,
    pub work_ahead_limit: usize,
    pub fail_fast: bool,
    pub save_metadata: bool,
    /// Re-verify contracts which already have metadata saved.
    pub force: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            work_ahead_limit: 16,
            fail_fast: false,
            save_metadata: true,
            force: false,
        }
    }
}

pub struct PipelineCoordinator {
    store: Arc<dyn ContractStore>,
    compiler: Arc<dyn ContractCompiler>,
    engine: Arc<VerificationEngine>,
    settings: PipelineSettings,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn ContractStore>,
        compiler: Arc<dyn ContractCompiler>,
        engine: Arc<VerificationEngine>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            compiler,
            engine,
            settings,
        }
    }

    /// Verifies every contract of the store.
    pub async fn run(&self) -> Result<Summary, PipelineError> {
        let contracts = self.store.list().await.map_err(PipelineError::List)?;
        self.run_for(contracts).await
    }

    pub async fn run_for(&self, contracts: Vec<ContractIdentity>) -> Result<Summary, PipelineError> {
        tracing::info!(
            contracts = contracts.len(),
            workers = self.settings.workers,
            work_ahead_limit = self.settings.work_ahead_limit,
            "starting verification"
        );

        let workers: Vec<_> = (0..self.settings.workers)
            .map(|_| {
                VerificationWorker::new(
                    self.store.clone(),
                    self.compiler.clone(),
                    self.engine.clone(),
                    self.settings.force,
                )
            })
            .collect();
        let mut handler = PipelineHandler::new(
            self.store.clone(),
            self.settings.save_metadata,
            self.settings.fail_fast,
        );

        let result = queue::process(
            contracts,
            workers,
            &mut handler,
            self.settings.work_ahead_limit,
        )
        .await;

        let summary = handler.summary();
        tracing::info!(
            verified = summary.verified,
            unverified = summary.unverified,
            skipped = summary.skipped,
            jumped = summary.jumped,
            failed = summary.failed,
            "verification finished"
        );
        result?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workers_is_bounded() {
        let workers = default_workers();
        assert!((1..=4).contains(&workers));
    }

    #[test]
    fn settings_reject_unknown_fields() {
        let parsed: Result<PipelineSettings, _> =
            serde_json::from_value(serde_json::json!({"workers": 2, "threads": 4}));
        assert!(parsed.is_err());

        let parsed: PipelineSettings =
            serde_json::from_value(serde_json::json!({"workers": 2})).unwrap();
        assert_eq!(2, parsed.workers);
        assert!(parsed.save_metadata);
    }
}
