use anyhow::Context;
use async_trait::async_trait;
use bytecode_verifier::{
    pipeline::{ContractConfig, ContractStore},
    verifier::ContractMetadata,
    ContractIdentity,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const INPUT_FILE: &str = "input.json";
const METADATA_FILE: &str = "metadata.json";

/// Contracts laid out as `<root>/<chain_id>/<address>/`.
pub struct FsContractStore {
    root: PathBuf,
}

impl FsContractStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn contract_dir(&self, id: &ContractIdentity) -> PathBuf {
        self.root.join(id.chain_id.to_string()).join(&id.address)
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, anyhow::Error> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&content).with_context(|| format!("parsing {}", path.display()))
    }

    async fn subdirectories(path: &Path) -> Result<Vec<String>, anyhow::Error> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("listing {}", path.display()))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => tracing::warn!(name = ?name, "skipping non utf-8 directory"),
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ContractStore for FsContractStore {
    async fn list(&self) -> Result<Vec<ContractIdentity>, anyhow::Error> {
        let mut contracts = Vec::new();
        for chain in Self::subdirectories(&self.root).await? {
            let Ok(chain_id) = chain.parse::<u64>() else {
                tracing::warn!(directory = %chain, "skipping directory which is not a chain id");
                continue;
            };
            for address in Self::subdirectories(&self.root.join(&chain)).await? {
                contracts.push(ContractIdentity::new(chain_id, address));
            }
        }
        contracts.sort();
        Ok(contracts)
    }

    async fn get_config(&self, id: &ContractIdentity) -> Result<ContractConfig, anyhow::Error> {
        Self::read_json(&self.contract_dir(id).join(CONFIG_FILE)).await
    }

    async fn get_input(&self, id: &ContractIdentity) -> Result<Value, anyhow::Error> {
        Self::read_json(&self.contract_dir(id).join(INPUT_FILE)).await
    }

    async fn has_metadata(&self, id: &ContractIdentity) -> Result<bool, anyhow::Error> {
        let path = self.contract_dir(id).join(METADATA_FILE);
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))
    }

    async fn save_metadata(
        &self,
        id: &ContractIdentity,
        metadata: &ContractMetadata,
    ) -> Result<(), anyhow::Error> {
        let path = self.contract_dir(id).join(METADATA_FILE);
        let mut content = serde_json::to_vec_pretty(metadata)?;
        content.push(b'\n');
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}
