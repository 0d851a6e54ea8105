mod native;
mod process;
pub mod wasm;

pub use native::{ExecutionMode, NativeExecutor};
pub use wasm::{WasmExecutor, WorkerCommand};

use crate::consts::{DEFAULT_COMPILE_TIMEOUT, DEFAULT_MAX_OUTPUT_SIZE};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("cannot spawn compiler process: {0}")]
    Spawn(std::io::Error),
    #[error("compiler process i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("compilation timed out after {0:?}")]
    Timeout(Duration),
    #[error("compiler output exceeds {0} bytes")]
    OutputTooLarge(usize),
    #[error("compiler output is not valid json: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("wasm worker protocol violation: {0}")]
    Protocol(String),
    #[error("wasm worker failed with {status}: {stderr}")]
    WorkerFailed { status: String, stderr: String },
}

/// Bounds applied to every compiler process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub timeout: Duration,
    pub max_output_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMPILE_TIMEOUT,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }
}

/// Runs a single standard-json compilation and returns the raw compiler output.
#[async_trait]
pub trait CompilerExecutor: Send + Sync {
    async fn compile(&self, input: &Value) -> Result<Value, ExecutorError>;
}
