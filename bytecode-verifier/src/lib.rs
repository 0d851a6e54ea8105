mod common_types;
mod consts;

pub mod bytecode;
pub mod compiler;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod verifier;

pub use common_types::ContractIdentity;
pub use compiler::wasm::run_worker_from_env as run_wasm_worker;
pub use consts::{DEFAULT_SOLC_BINARIES_HOST, WASM_WORKER_SENTINEL};
