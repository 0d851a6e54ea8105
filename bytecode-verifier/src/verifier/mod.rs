mod engine;
mod metadata;

pub use engine::{compare, Comparison, MatchedContract, NodeRpc, VerificationEngine, VerifyResult};
pub use metadata::ContractMetadata;

use crate::common_types::ContractIdentity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("contract {0} not found in compiler output")]
    ContractNotFound(String),
    #[error("no code at {0}; the contract was likely self-destructed")]
    NoCode(ContractIdentity),
    #[error("invalid {kind} bytecode: {error}")]
    InvalidBytecode {
        kind: &'static str,
        error: hex::FromHexError,
    },
    #[error("node rpc request failed: {0:#}")]
    Rpc(anyhow::Error),
}
