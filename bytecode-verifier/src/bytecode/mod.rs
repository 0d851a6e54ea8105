mod hash;
mod metadata;
mod opcodes;

pub use hash::{decode_hex, keccak256, to_prefixed_hex, CodeHashes};
pub use metadata::{extract_metadata, find_trailers, split_metadata, strip_metadata, MetadataTrailer};
pub use opcodes::{decode as decode_instructions, instructions_match, opcode_bytes, Instruction};
