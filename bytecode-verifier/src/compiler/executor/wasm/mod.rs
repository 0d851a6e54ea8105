//! Compilation with WebAssembly builds of solc.
//!
//! The module runs inside a dedicated worker process: the parent spawns the
//! worker with [`WASM_WORKER_SENTINEL`] set, sends it a single input over
//! stdin and reads the result from stdout. The worker force-exits afterwards.

mod child;
mod protocol;

pub use child::{run_worker_from_env, serve};
pub use protocol::{ChildMessage, ParentMessage};

use super::{process::read_capped, CompilerExecutor, ExecutionLimits, ExecutorError};
use crate::consts::{
    WASM_WORKER_MAX_OUTPUT_SIZE, WASM_WORKER_RUNTIME, WASM_WORKER_SENTINEL, WASM_WORKER_TIMEOUT_MS,
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    process::Command,
};
use tracing::instrument;

/// How to start a worker process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// JavaScript runtime the worker evaluates the compiler module with.
    pub js_runtime: String,
}

impl WorkerCommand {
    /// The currently running executable acts as the worker.
    pub fn current_exe(js_runtime: String) -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec![],
            js_runtime,
        })
    }
}

/// Drives the parent side of the handshake and returns the compiler output.
pub async fn drive<R, W>(
    reader: &mut R,
    writer: &mut W,
    id: u64,
    compiler_filename: &str,
    payload: &Value,
    max_size: usize,
) -> Result<Value, ExecutorError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match protocol::read_message(reader, max_size).await? {
        Some(ChildMessage::Ready) => {}
        Some(message) => {
            return Err(ExecutorError::Protocol(format!(
                "expected ready, got {message:?}"
            )))
        }
        None => {
            return Err(ExecutorError::Protocol(
                "worker exited before ready".to_string(),
            ))
        }
    }

    let input = ParentMessage::Input {
        id,
        compiler_filename: compiler_filename.to_string(),
        payload: payload.clone(),
    };
    protocol::write_message(writer, &input).await?;

    let result = match protocol::read_message(reader, max_size).await? {
        Some(ChildMessage::Output {
            id: output_id,
            result,
        }) if output_id == id => result,
        Some(ChildMessage::Output { id: output_id, .. }) => {
            return Err(ExecutorError::Protocol(format!(
                "output id mismatch; expected={id}, found={output_id}"
            )))
        }
        Some(message) => {
            return Err(ExecutorError::Protocol(format!(
                "expected output, got {message:?}"
            )))
        }
        None => {
            return Err(ExecutorError::Protocol(
                "worker exited before output".to_string(),
            ))
        }
    };

    // the worker exits on its own even if the shutdown is not delivered
    if let Err(err) = protocol::write_message(writer, &ParentMessage::Shutdown).await {
        tracing::debug!("cannot deliver shutdown to wasm worker: {err}");
    }
    Ok(result)
}

pub struct WasmExecutor {
    compiler_path: PathBuf,
    worker: WorkerCommand,
    limits: ExecutionLimits,
    next_id: AtomicU64,
}

impl WasmExecutor {
    pub fn new(compiler_path: PathBuf, worker: WorkerCommand, limits: ExecutionLimits) -> Self {
        Self {
            compiler_path,
            worker,
            limits,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.worker.program);
        command
            .args(&self.worker.args)
            .env(WASM_WORKER_SENTINEL, "1")
            .env(WASM_WORKER_RUNTIME, &self.worker.js_runtime)
            .env(
                WASM_WORKER_TIMEOUT_MS,
                self.limits.timeout.as_millis().to_string(),
            )
            .env(
                WASM_WORKER_MAX_OUTPUT_SIZE,
                self.limits.max_output_size.to_string(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, id: u64, input: &Value) -> Result<Value, ExecutorError> {
        let mut child = self.command().spawn().map_err(ExecutorError::Spawn)?;
        let (mut stdin, stdout, stderr) = match (
            child.stdin.take(),
            child.stdout.take(),
            child.stderr.take(),
        ) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                return Err(ExecutorError::Protocol(
                    "worker streams are not piped".to_string(),
                ))
            }
        };

        let max_size = self.limits.max_output_size;
        let stderr = tokio::spawn(read_capped(stderr, max_size));

        let mut stdout = BufReader::new(stdout);
        let compiler_filename = self.compiler_path.to_string_lossy();
        let result = drive(
            &mut stdout,
            &mut stdin,
            id,
            &compiler_filename,
            input,
            max_size,
        )
        .await;
        drop(stdin);
        if result.is_err() {
            let _ = child.start_kill();
        }

        let status = child.wait().await?;
        let stderr = match stderr.await {
            Ok(Ok(stderr)) => String::from_utf8_lossy(&stderr).into_owned(),
            _ => String::new(),
        };
        if !stderr.is_empty() {
            tracing::warn!(id, "wasm worker stderr: {stderr}");
        }

        let result = result?;
        if !status.success() {
            return Err(ExecutorError::WorkerFailed {
                status: status.to_string(),
                stderr,
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl CompilerExecutor for WasmExecutor {
    #[instrument(skip_all, fields(compiler = %self.compiler_path.display()), level = "debug")]
    async fn compile(&self, input: &Value) -> Result<Value, ExecutorError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = self.limits.timeout;
        tokio::time::timeout(timeout, self.run(id, input))
            .await
            .map_err(|_| ExecutorError::Timeout(timeout))?
    }
}
