//! Compile-and-verify of every stored contract on top of the ordered queue.

mod coordinator;
mod handler;
mod worker;

pub use coordinator::{default_workers, PipelineCoordinator, PipelineSettings};
pub use handler::{PipelineHandler, Summary};
pub use worker::{ItemError, ItemOutcome, VerificationWorker};

use crate::{
    common_types::ContractIdentity,
    compiler::{self, CompilerNameDetail, Compilers, Contracts},
    queue::QueueError,
    verifier::ContractMetadata,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Per-contract verification parameters kept next to the sources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConfig {
    pub contract_name: String,
    pub compiler: String,
    #[serde(default)]
    pub source_path: Option<String>,
    /// Excludes the contract from verification.
    #[serde(default)]
    pub skip: bool,
}

/// Storage of contract sources and verification artifacts.
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ContractIdentity>, anyhow::Error>;

    async fn get_config(&self, id: &ContractIdentity) -> Result<ContractConfig, anyhow::Error>;

    /// Standard-json compiler input.
    async fn get_input(&self, id: &ContractIdentity) -> Result<Value, anyhow::Error>;

    async fn has_metadata(&self, id: &ContractIdentity) -> Result<bool, anyhow::Error>;

    async fn save_metadata(
        &self,
        id: &ContractIdentity,
        metadata: &ContractMetadata,
    ) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait ContractCompiler: Send + Sync {
    async fn compile(&self, compiler: &str, input: &Value) -> Result<Contracts, compiler::Error>;
}

#[async_trait]
impl ContractCompiler for Compilers {
    async fn compile(&self, compiler: &str, input: &Value) -> Result<Contracts, compiler::Error> {
        let name = CompilerNameDetail::parse(compiler)?;
        let result = Compilers::compile(self, &name, input).await?;
        Ok(result.contracts)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list contracts: {0:#}")]
    List(anyhow::Error),
    #[error("no pipeline workers configured")]
    NoWorkers,
    #[error("stopped after {contract}: {reason}")]
    FailFast {
        contract: ContractIdentity,
        reason: String,
    },
    #[error("pipeline worker failed: {0}")]
    Worker(#[source] tokio::task::JoinError),
}

impl From<QueueError<PipelineError>> for PipelineError {
    fn from(error: QueueError<PipelineError>) -> Self {
        match error {
            QueueError::NoWorkers => PipelineError::NoWorkers,
            QueueError::Handler(error) => error,
            QueueError::WorkerPanicked(error) => PipelineError::Worker(error),
        }
    }
}
