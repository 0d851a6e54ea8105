use super::{metadata, opcodes};
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Hex encoding with the `0x` prefix used in every persisted hash.
pub fn to_prefixed_hex(data: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decodes hex with or without the `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let value = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(value)
}

/// Fingerprints of the live code of a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeHashes {
    /// Hash of the code as is.
    pub runtime_hash: String,
    /// Hash of the instruction stream of the code stripped from metadata, operands excluded.
    pub opcode_hash: String,
    /// Hash of the code stripped from metadata.
    pub metaless_hash: String,
}

impl CodeHashes {
    pub fn compute(code: &[u8]) -> Self {
        let stripped = metadata::strip_metadata(code);
        Self::compute_with_stripped(code, &stripped)
    }

    pub fn compute_with_stripped(code: &[u8], stripped: &[u8]) -> Self {
        Self {
            runtime_hash: to_prefixed_hex(keccak256(code)),
            opcode_hash: to_prefixed_hex(keccak256(&opcodes::opcode_bytes(stripped))),
            metaless_hash: to_prefixed_hex(keccak256(stripped)),
        }
    }
}
