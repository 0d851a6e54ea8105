use super::{process, CompilerExecutor, ExecutionLimits, ExecutorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

/// How native compiler builds are launched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// The binary is executed directly.
    #[default]
    Direct,
    /// The binary is executed through `/bin/sh -c`.
    PosixShell,
}

pub struct NativeExecutor {
    path: PathBuf,
    mode: ExecutionMode,
    limits: ExecutionLimits,
}

impl NativeExecutor {
    pub fn new(path: PathBuf, mode: ExecutionMode, limits: ExecutionLimits) -> Self {
        Self { path, mode, limits }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self) -> Command {
        match self.mode {
            ExecutionMode::Direct => {
                let mut command = Command::new(&self.path);
                command.arg("--standard-json");
                command
            }
            ExecutionMode::PosixShell => {
                // the path is passed as `$0` and never becomes part of the script
                let mut command = Command::new("/bin/sh");
                command
                    .arg("-c")
                    .arg("exec \"$0\" --standard-json")
                    .arg(&self.path);
                command
            }
        }
    }
}

#[async_trait]
impl CompilerExecutor for NativeExecutor {
    #[instrument(skip_all, fields(compiler = %self.path.display(), mode = ?self.mode), level = "debug")]
    async fn compile(&self, input: &Value) -> Result<Value, ExecutorError> {
        let input = serde_json::to_vec(input)?;
        let output = process::run(self.command(), input, &self.limits).await?;

        if !output.stderr.is_empty() {
            tracing::warn!(
                compiler = %self.path.display(),
                "compiler stderr: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        if !output.status.success() {
            tracing::debug!(status = %output.status, "compiler exited with non-zero status");
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::{os::unix::fs::PermissionsExt, time::Duration};

    const FAKE_SOLC: &str = r#"#!/bin/sh
if [ "$1" != "--standard-json" ]; then
    echo "unexpected arguments: $*" >&2
    exit 1
fi
input=$(cat)
echo "Warning: this is a fake compiler" >&2
printf '{"contracts":{},"sources":{},"input":%s}' "$input"
"#;

    fn fake_solc(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("solc-linux-amd64-v0.8.9+commit.e5eed63a");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[rstest::rstest]
    #[case(ExecutionMode::Direct)]
    #[case(ExecutionMode::PosixShell)]
    #[tokio::test]
    async fn stdout_json_is_returned(#[case] mode: ExecutionMode) {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_solc(dir.path(), FAKE_SOLC);
        let executor = NativeExecutor::new(path, mode, ExecutionLimits::default());

        let input = json!({"language": "Solidity", "sources": {}});
        let output = executor.compile(&input).await.unwrap();

        assert_eq!(
            json!({"contracts": {}, "sources": {}, "input": input}),
            output
        );
    }

    #[tokio::test]
    async fn non_json_stdout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_solc(dir.path(), "#!/bin/sh\necho 'Segmentation fault' >&2\nexit 139\n");
        let executor = NativeExecutor::new(path, ExecutionMode::Direct, ExecutionLimits::default());

        let result = executor.compile(&json!({})).await;
        assert!(
            matches!(result, Err(ExecutorError::InvalidOutput(_))),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn hanging_compiler_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_solc(dir.path(), "#!/bin/sh\nsleep 10\n");
        let limits = ExecutionLimits {
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let executor = NativeExecutor::new(path, ExecutionMode::PosixShell, limits);

        let result = executor.compile(&json!({})).await;
        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
    }
}
