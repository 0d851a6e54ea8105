use super::{ExecutionLimits, ExecutorError};
use std::{io::ErrorKind, process::Stdio};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
};

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: std::process::ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Reads the stream until EOF, failing as soon as more than `max` bytes arrive.
pub async fn read_capped<R: AsyncRead + Unpin>(
    reader: R,
    max: usize,
) -> Result<Vec<u8>, ExecutorError> {
    let mut buffer = Vec::new();
    reader
        .take(max as u64 + 1)
        .read_to_end(&mut buffer)
        .await?;
    if buffer.len() > max {
        return Err(ExecutorError::OutputTooLarge(max));
    }
    Ok(buffer)
}

/// Spawns the command, feeds `input` to its stdin and collects its output.
///
/// The process is killed if the timeout expires or any output limit is exceeded.
pub async fn run(
    mut command: Command,
    input: Vec<u8>,
    limits: &ExecutionLimits,
) -> Result<ProcessOutput, ExecutorError> {
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = command.spawn().map_err(ExecutorError::Spawn)?;

    let (mut stdin, stdout, stderr) = match (
        child.stdin.take(),
        child.stdout.take(),
        child.stderr.take(),
    ) {
        (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
        _ => {
            return Err(ExecutorError::Spawn(std::io::Error::new(
                ErrorKind::Other,
                "child process streams are not piped",
            )))
        }
    };

    let max = limits.max_output_size;
    let communicate = async move {
        let write = async move {
            let result = async {
                stdin.write_all(&input).await?;
                stdin.shutdown().await
            }
            .await;
            match result {
                // the process may exit without consuming the whole input
                Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other.map_err(ExecutorError::from),
            }
        };
        let ((), stdout, stderr) =
            tokio::try_join!(write, read_capped(stdout, max), read_capped(stderr, max))?;
        let status = child.wait().await?;
        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        })
    };

    tokio::time::timeout(limits.timeout, communicate)
        .await
        .map_err(|_| ExecutorError::Timeout(limits.timeout))?
}
