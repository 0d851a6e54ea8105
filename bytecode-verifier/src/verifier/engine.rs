use super::VerificationError;
use crate::{
    bytecode::{decode_hex, instructions_match, strip_metadata},
    common_types::ContractIdentity,
    compiler::{find_contract, CompiledContract, Contracts},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::instrument;

/// Access to the code deployed on chains.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Returns the deployed code; empty code means there is no contract at the address.
    async fn get_code(&self, chain_id: u64, address: &str) -> Result<Bytes, anyhow::Error>;
}

/// Outcome of comparing live code against compiled code at every tolerance level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Comparison {
    pub direct: bool,
    pub runtime: bool,
    pub opcode: bool,
}

pub fn compare(live: &[u8], compiled: &[u8]) -> Comparison {
    let live_stripped = strip_metadata(live);
    let compiled_stripped = strip_metadata(compiled);
    Comparison {
        direct: live == compiled,
        runtime: live_stripped == compiled_stripped,
        opcode: instructions_match(&live_stripped, &compiled_stripped),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchedContract {
    pub file: String,
    pub name: String,
    pub contract: CompiledContract,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerifyResult {
    pub is_direct_verified: bool,
    pub is_runtime_verified: bool,
    pub is_opcode_verified: bool,
    pub live_code: Bytes,
    pub matched: MatchedContract,
}

impl VerifyResult {
    /// Direct equality is informational; a contract is verified at the runtime or opcode level.
    pub fn is_verified(&self) -> bool {
        self.is_runtime_verified || self.is_opcode_verified
    }
}

pub struct VerificationEngine {
    rpc: Arc<dyn NodeRpc>,
}

impl VerificationEngine {
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    #[instrument(skip(self, contracts), fields(contract = %identity), level = "debug")]
    pub async fn verify(
        &self,
        identity: &ContractIdentity,
        contracts: &Contracts,
        contract_name: &str,
        source_path: Option<&str>,
    ) -> Result<VerifyResult, VerificationError> {
        let (file, contract) = find_contract(contracts, contract_name, source_path)
            .ok_or_else(|| VerificationError::ContractNotFound(contract_name.to_string()))?;

        let compiled = decode_hex(&contract.evm.deployed_bytecode.object).map_err(|error| {
            VerificationError::InvalidBytecode {
                kind: "compiled",
                error,
            }
        })?;

        let live_code = self
            .rpc
            .get_code(identity.chain_id, &identity.address)
            .await
            .map_err(VerificationError::Rpc)?;
        if live_code.is_empty() {
            return Err(VerificationError::NoCode(identity.clone()));
        }

        let comparison = compare(&live_code, &compiled);
        tracing::debug!(
            direct = comparison.direct,
            runtime = comparison.runtime,
            opcode = comparison.opcode,
            "bytecode compared"
        );

        Ok(VerifyResult {
            is_direct_verified: comparison.direct,
            is_runtime_verified: comparison.runtime,
            is_opcode_verified: comparison.opcode,
            live_code,
            matched: MatchedContract {
                file: file.to_string(),
                name: contract_name.to_string(),
                contract: contract.clone(),
            },
        })
    }
}
