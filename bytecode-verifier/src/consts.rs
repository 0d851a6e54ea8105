use std::time::Duration;

pub const DEFAULT_SOLC_BINARIES_HOST: &str = "https://binaries.soliditylang.org/";

/// Environment variable marking a process as the wasm compiler worker.
pub const WASM_WORKER_SENTINEL: &str = "BYTECODE_VERIFIER_WASM_WORKER";
/// Environment variable carrying the JavaScript runtime used by the wasm worker.
pub const WASM_WORKER_RUNTIME: &str = "BYTECODE_VERIFIER_WASM_RUNTIME";
/// Execution limits the wasm worker applies to the JavaScript runtime.
pub const WASM_WORKER_TIMEOUT_MS: &str = "BYTECODE_VERIFIER_WASM_TIMEOUT_MS";
pub const WASM_WORKER_MAX_OUTPUT_SIZE: &str = "BYTECODE_VERIFIER_WASM_MAX_OUTPUT_SIZE";

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 64 * 1024 * 1024;
pub const WASM_WORKER_INPUT_TIMEOUT: Duration = Duration::from_secs(30);
