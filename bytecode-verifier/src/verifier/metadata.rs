use super::VerifyResult;
use crate::{
    bytecode::{extract_metadata, strip_metadata, CodeHashes},
    compiler::BytecodeObject,
};
use serde::Serialize;
use serde_json::Value;
use solidity_cbor_metadata::Metadata;

/// Artifact persisted for every verified contract.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub compiler: String,
    pub opcode_hash: String,
    pub metaless_hash: String,
    pub runtime_hash: String,
    pub encoded_metadata: Vec<Metadata>,
    pub abi: Value,
    pub deployed_bytecode: BytecodeObject,
    pub bytecode: BytecodeObject,
}

impl ContractMetadata {
    pub fn new(compiler: &str, result: &VerifyResult) -> Self {
        let live_code = result.live_code.as_ref();
        let stripped = strip_metadata(live_code);
        let hashes = CodeHashes::compute_with_stripped(live_code, &stripped);
        let contract = &result.matched.contract;
        Self {
            compiler: compiler.to_string(),
            opcode_hash: hashes.opcode_hash,
            metaless_hash: hashes.metaless_hash,
            runtime_hash: hashes.runtime_hash,
            encoded_metadata: extract_metadata(live_code),
            abi: contract.abi.clone(),
            deployed_bytecode: contract.evm.deployed_bytecode.clone(),
            bytecode: contract.evm.bytecode.clone(),
        }
    }
}
