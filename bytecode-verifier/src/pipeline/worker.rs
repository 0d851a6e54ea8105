use super::{ContractCompiler, ContractStore};
use crate::{
    common_types::ContractIdentity,
    compiler,
    queue::{WorkItem, Worker},
    verifier::{ContractMetadata, VerificationEngine, VerificationError, VerifyResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("contract storage: {0:#}")]
    Store(anyhow::Error),
    #[error(transparent)]
    Compiler(#[from] compiler::Error),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// What happened to a single contract.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Excluded by its config.
    Skipped,
    /// Metadata is already saved and re-verification was not forced.
    Jumped,
    Verified {
        result: Box<VerifyResult>,
        metadata: Box<ContractMetadata>,
    },
    Unverified {
        result: Box<VerifyResult>,
    },
    Failed(ItemError),
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Jumped => "jumped",
            ItemOutcome::Verified { .. } => "verified",
            ItemOutcome::Unverified { .. } => "unverified",
            ItemOutcome::Failed(_) => "failed",
        }
    }
}

/// Resolves the compiler, compiles and verifies one contract per call.
#[derive(Clone)]
pub struct VerificationWorker {
    store: Arc<dyn ContractStore>,
    compiler: Arc<dyn ContractCompiler>,
    engine: Arc<VerificationEngine>,
    force: bool,
}

impl VerificationWorker {
    pub fn new(
        store: Arc<dyn ContractStore>,
        compiler: Arc<dyn ContractCompiler>,
        engine: Arc<VerificationEngine>,
        force: bool,
    ) -> Self {
        Self {
            store,
            compiler,
            engine,
            force,
        }
    }

    async fn verify(&self, id: &ContractIdentity) -> Result<ItemOutcome, ItemError> {
        let config = self.store.get_config(id).await.map_err(ItemError::Store)?;
        if config.skip {
            return Ok(ItemOutcome::Skipped);
        }
        if !self.force && self.store.has_metadata(id).await.map_err(ItemError::Store)? {
            return Ok(ItemOutcome::Jumped);
        }

        let input = self.store.get_input(id).await.map_err(ItemError::Store)?;
        let contracts = self.compiler.compile(&config.compiler, &input).await?;
        let result = self
            .engine
            .verify(
                id,
                &contracts,
                &config.contract_name,
                config.source_path.as_deref(),
            )
            .await?;

        if result.is_verified() {
            let metadata = ContractMetadata::new(&config.compiler, &result);
            Ok(ItemOutcome::Verified {
                result: Box::new(result),
                metadata: Box::new(metadata),
            })
        } else {
            Ok(ItemOutcome::Unverified {
                result: Box::new(result),
            })
        }
    }
}

#[async_trait]
impl Worker<ContractIdentity> for VerificationWorker {
    type Output = ItemOutcome;

    async fn process(&mut self, item: &WorkItem<ContractIdentity>) -> ItemOutcome {
        tracing::debug!(
            contract = %item.payload,
            index = item.index + 1,
            total = item.total_count,
            "verifying contract"
        );
        self.verify(&item.payload)
            .await
            .unwrap_or_else(ItemOutcome::Failed)
    }
}
