use super::{
    super::{process, ExecutionLimits, ExecutorError},
    protocol::{self, ChildMessage, ParentMessage},
};
use crate::consts::{
    DEFAULT_MAX_OUTPUT_SIZE, WASM_WORKER_INPUT_TIMEOUT, WASM_WORKER_MAX_OUTPUT_SIZE,
    WASM_WORKER_RUNTIME, WASM_WORKER_TIMEOUT_MS,
};
use serde_json::Value;
use std::{future::Future, time::Duration};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    process::Command,
};

/// Evaluates a soljson module with a standard-json input read from stdin.
const COMPILE_SCRIPT: &str = r#"
const fs = require('fs');
const soljson = require(process.argv[1]);
const input = fs.readFileSync(0, 'utf8');
let output;
if ('_solidity_compile' in soljson) {
    const compile = soljson.cwrap('solidity_compile', 'string', ['string', 'number', 'number']);
    output = compile(input, 0, 0);
} else if ('_compileStandard' in soljson) {
    const compile = soljson.cwrap('compileStandard', 'string', ['string', 'number']);
    output = compile(input, 0);
} else {
    const message = 'compiler does not support standard json input';
    output = JSON.stringify({
        errors: [{ severity: 'error', type: 'UnsupportedCompiler', message, formattedMessage: message }],
    });
}
process.stdout.write(output, () => process.exit(0));
"#;

/// Serves the worker side of the handshake for a single compilation.
///
/// Fails if no input arrives within `input_timeout` after announcing readiness.
pub async fn serve<R, W, F, Fut>(
    mut reader: R,
    mut writer: W,
    input_timeout: Duration,
    compile: F,
) -> Result<(), ExecutorError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnOnce(String, Value) -> Fut,
    Fut: Future<Output = Result<Value, ExecutorError>>,
{
    protocol::write_message(&mut writer, &ChildMessage::Ready).await?;

    let message = tokio::time::timeout(
        input_timeout,
        protocol::read_message::<_, ParentMessage>(&mut reader, DEFAULT_MAX_OUTPUT_SIZE),
    )
    .await
    .map_err(|_| {
        ExecutorError::Protocol(format!("no input received within {input_timeout:?}"))
    })??;

    let (id, compiler_filename, payload) = match message {
        Some(ParentMessage::Input {
            id,
            compiler_filename,
            payload,
        }) => (id, compiler_filename, payload),
        Some(ParentMessage::Shutdown) => return Ok(()),
        None => {
            return Err(ExecutorError::Protocol(
                "parent closed the stream before input".to_string(),
            ))
        }
    };

    let result = compile(compiler_filename, payload).await?;
    protocol::write_message(&mut writer, &ChildMessage::Output { id, result }).await?;

    // closing the stream counts as shutdown as well
    let _ = tokio::time::timeout(
        input_timeout,
        protocol::read_message::<_, ParentMessage>(&mut reader, DEFAULT_MAX_OUTPUT_SIZE),
    )
    .await;
    Ok(())
}

/// Limits handed over by the parent. Missing or malformed values fall back to defaults.
fn limits_from_vars(timeout_ms: Option<String>, max_output_size: Option<String>) -> ExecutionLimits {
    let defaults = ExecutionLimits::default();
    ExecutionLimits {
        timeout: timeout_ms
            .and_then(|value| value.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout),
        max_output_size: max_output_size
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.max_output_size),
    }
}

async fn compile_with_js_runtime(
    js_runtime: String,
    limits: ExecutionLimits,
    compiler_filename: String,
    payload: Value,
) -> Result<Value, ExecutorError> {
    let mut command = Command::new(js_runtime);
    command.arg("-e").arg(COMPILE_SCRIPT).arg(compiler_filename);
    let output = process::run(command, serde_json::to_vec(&payload)?, &limits).await?;
    if !output.stderr.is_empty() {
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Entry point of the worker process.
///
/// Serves exactly one compilation over stdin/stdout and terminates the
/// process instead of returning, so the module teardown never runs.
pub fn run_worker_from_env() -> ! {
    let js_runtime = std::env::var(WASM_WORKER_RUNTIME).unwrap_or_else(|_| "node".to_string());
    let limits = limits_from_vars(
        std::env::var(WASM_WORKER_TIMEOUT_MS).ok(),
        std::env::var(WASM_WORKER_MAX_OUTPUT_SIZE).ok(),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("cannot start wasm worker runtime: {err}");
            std::process::exit(1)
        }
    };

    let result = runtime.block_on(serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        WASM_WORKER_INPUT_TIMEOUT,
        |compiler_filename, payload| {
            compile_with_js_runtime(js_runtime, limits, compiler_filename, payload)
        },
    ));

    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("wasm worker failed: {err}");
            std::process::exit(1)
        }
    }
}
