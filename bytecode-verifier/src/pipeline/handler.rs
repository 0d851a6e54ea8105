use super::{ContractStore, ItemError, ItemOutcome, PipelineError};
use crate::{
    common_types::ContractIdentity,
    metrics,
    queue::{ResultHandler, WorkItem},
};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub verified: usize,
    pub unverified: usize,
    pub skipped: usize,
    pub jumped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.verified + self.unverified + self.skipped + self.jumped + self.failed
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Jumped => self.jumped += 1,
            ItemOutcome::Verified { .. } => self.verified += 1,
            ItemOutcome::Unverified { .. } => self.unverified += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Applies the save/skip/fail-fast policy to outcomes in input order.
pub struct PipelineHandler {
    store: Arc<dyn ContractStore>,
    save_metadata: bool,
    fail_fast: bool,
    summary: Summary,
}

impl PipelineHandler {
    pub fn new(store: Arc<dyn ContractStore>, save_metadata: bool, fail_fast: bool) -> Self {
        Self {
            store,
            save_metadata,
            fail_fast,
            summary: Summary::default(),
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    fn stop_if_fail_fast(
        &self,
        contract: &ContractIdentity,
        reason: String,
    ) -> Result<(), PipelineError> {
        if self.fail_fast {
            return Err(PipelineError::FailFast {
                contract: contract.clone(),
                reason,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResultHandler<ContractIdentity, ItemOutcome> for PipelineHandler {
    type Error = PipelineError;

    async fn handle(
        &mut self,
        item: WorkItem<ContractIdentity>,
        mut outcome: ItemOutcome,
    ) -> Result<(), PipelineError> {
        let contract = &item.payload;
        let progress = format!("{}/{}", item.index + 1, item.total_count);
        let elapsed_ms = item.elapsed().unwrap_or_default().as_millis() as u64;

        let save_error = match &outcome {
            ItemOutcome::Verified { metadata, .. } if self.save_metadata => {
                self.store.save_metadata(contract, metadata).await.err()
            }
            _ => None,
        };
        if let Some(err) = save_error {
            outcome = ItemOutcome::Failed(ItemError::Store(err));
        }

        self.summary.record(&outcome);
        metrics::PIPELINE_OUTCOMES
            .with_label_values(&[outcome.label()])
            .inc();

        match &outcome {
            ItemOutcome::Skipped => {
                tracing::info!(contract = %contract, progress = %progress, "skipped by config");
                Ok(())
            }
            ItemOutcome::Jumped => {
                tracing::info!(contract = %contract, progress = %progress, "metadata exists, jumped");
                Ok(())
            }
            ItemOutcome::Verified { result, .. } => {
                tracing::info!(
                    contract = %contract,
                    progress = %progress,
                    elapsed_ms,
                    direct = result.is_direct_verified,
                    runtime = result.is_runtime_verified,
                    opcode = result.is_opcode_verified,
                    "verified"
                );
                Ok(())
            }
            ItemOutcome::Unverified { result } => {
                tracing::warn!(
                    contract = %contract,
                    progress = %progress,
                    elapsed_ms,
                    matched = %format!("{}:{}", result.matched.file, result.matched.name),
                    "bytecode mismatch"
                );
                self.stop_if_fail_fast(contract, "bytecode mismatch".to_string())
            }
            ItemOutcome::Failed(err) => {
                tracing::error!(
                    contract = %contract,
                    progress = %progress,
                    elapsed_ms,
                    err = %err,
                    "verification failed"
                );
                self.stop_if_fail_fast(contract, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ContractConfig;
    use crate::verifier::ContractMetadata;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    struct NoopStore;

    #[async_trait]
    impl ContractStore for NoopStore {
        async fn list(&self) -> Result<Vec<ContractIdentity>, anyhow::Error> {
            Ok(vec![])
        }

        async fn get_config(&self, _id: &ContractIdentity) -> Result<ContractConfig, anyhow::Error> {
            Ok(ContractConfig::default())
        }

        async fn get_input(&self, _id: &ContractIdentity) -> Result<Value, anyhow::Error> {
            Ok(Value::Null)
        }

        async fn has_metadata(&self, _id: &ContractIdentity) -> Result<bool, anyhow::Error> {
            Ok(false)
        }

        async fn save_metadata(
            &self,
            _id: &ContractIdentity,
            _metadata: &ContractMetadata,
        ) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    fn item(index: usize) -> WorkItem<ContractIdentity> {
        let mut item = WorkItem::start(index, 3, ContractIdentity::new(1, format!("0x{index:040x}")));
        item.finish();
        item
    }

    fn failed() -> ItemOutcome {
        ItemOutcome::Failed(ItemError::Store(anyhow::anyhow!("config is missing")))
    }

    #[tokio::test]
    async fn failures_are_counted_without_fail_fast() {
        let store = Arc::new(NoopStore);
        let mut handler = PipelineHandler::new(store, true, false);

        handler.handle(item(0), ItemOutcome::Skipped).await.unwrap();
        handler.handle(item(1), failed()).await.unwrap();
        handler.handle(item(2), ItemOutcome::Jumped).await.unwrap();

        assert_eq!(
            Summary {
                skipped: 1,
                failed: 1,
                jumped: 1,
                ..Default::default()
            },
            handler.summary()
        );
        assert_eq!(3, handler.summary().total());
    }

    #[tokio::test]
    async fn fail_fast_reports_contract() {
        let store = Arc::new(NoopStore);
        let mut handler = PipelineHandler::new(store, true, true);

        let err = handler.handle(item(1), failed()).await.unwrap_err();

        match err {
            PipelineError::FailFast { contract, reason } => {
                assert_eq!(ContractIdentity::new(1, format!("0x{:040x}", 1)), contract);
                assert!(reason.contains("config is missing"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(1, handler.summary().failed);
    }
}
