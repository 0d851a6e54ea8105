use super::{
    architecture::Architecture,
    build_resolver::{BuildInfo, BuildResolver},
    download_cache::{ArtifactCache, DownloadRequest},
    executor::{
        CompilerExecutor, ExecutionLimits, ExecutionMode, ExecutorError, NativeExecutor,
        WasmExecutor, WorkerCommand,
    },
    fetcher::FetchError,
    name::{CompilerNameDetail, ParseError},
    output::{format_errors, CompilerOutput, Contracts},
};
use crate::{metrics, metrics::GuardedGauge};
use anyhow::Context;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid compiler name: {0}")]
    Parse(#[from] ParseError),
    #[error("compiler version not found: {0}")]
    CompilerNotFound(String),
    #[error("error while fetching compiler: {0}")]
    Fetch(#[from] FetchError),
    #[error("compilation error: {}", format_errors(.0))]
    Compilation(Vec<Value>),
    #[error("compiler execution failed: {0}")]
    Executor(#[from] ExecutorError),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct CompilersConfig {
    /// Native architecture of the host; `None` restricts compilation to wasm builds.
    pub native_architecture: Option<Architecture>,
    pub execution_mode: ExecutionMode,
    pub limits: ExecutionLimits,
    pub wasm_worker: WorkerCommand,
}

#[derive(Clone, Debug)]
pub struct CompileResult {
    pub build: BuildInfo,
    pub contracts: Contracts,
    pub sources: BTreeMap<String, Value>,
    pub raw: Value,
}

/// Resolves, downloads and runs compilers, bounding the number of
/// simultaneous compilations.
pub struct Compilers {
    resolver: BuildResolver,
    cache: ArtifactCache,
    config: CompilersConfig,
    threads_semaphore: Arc<Semaphore>,
}

impl Compilers {
    pub fn new(
        resolver: BuildResolver,
        cache: ArtifactCache,
        config: CompilersConfig,
        threads_semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            resolver,
            cache,
            config,
            threads_semaphore,
        }
    }

    #[instrument(name = "fetch_compiler", skip(self), level = "debug")]
    pub async fn executor(
        &self,
        name: &CompilerNameDetail,
    ) -> Result<(BuildInfo, Box<dyn CompilerExecutor>), Error> {
        let build = self
            .resolver
            .get_compatible_build(name, Architecture::Wasm, self.config.native_architecture)
            .await?;

        let request = DownloadRequest {
            url: build.build.url.clone(),
            filename: build
                .architecture
                .artifact_filename(&build.build.long_version),
            executable: !build.architecture.is_wasm(),
            sha256: build.build.sha256.clone(),
        };
        // a listed build without an artifact is a missing version, not a broken network
        let path = self
            .cache
            .download(&request)
            .await
            .map_err(|err| match err {
                FetchError::NotFound(_) => Error::CompilerNotFound(name.long_version.clone()),
                err => Error::Fetch(err),
            })?;

        let executor: Box<dyn CompilerExecutor> = if build.architecture.is_wasm() {
            // the worker may run with another working directory
            let path = tokio::fs::canonicalize(&path)
                .await
                .context("resolving wasm compiler path")?;
            Box::new(WasmExecutor::new(
                path,
                self.config.wasm_worker.clone(),
                self.config.limits,
            ))
        } else {
            Box::new(NativeExecutor::new(
                path,
                self.config.execution_mode,
                self.config.limits,
            ))
        };
        Ok((build, executor))
    }

    #[instrument(name = "compile", skip(self, input), fields(compiler = %name), level = "debug")]
    pub async fn compile(
        &self,
        name: &CompilerNameDetail,
        input: &Value,
    ) -> Result<CompileResult, Error> {
        let (build, executor) = self.executor(name).await?;

        let raw = {
            let _permit = {
                let _wait_timer_guard = metrics::COMPILATION_QUEUE_TIME.start_timer();
                let _wait_gauge_guard = metrics::COMPILATIONS_IN_QUEUE.guarded_inc();
                self.threads_semaphore
                    .acquire()
                    .await
                    .context("acquiring lock")?
            };

            let _compile_timer_guard = metrics::COMPILE_TIME.start_timer();
            let _compile_gauge_guard = metrics::COMPILATIONS_IN_FLIGHT.guarded_inc();

            executor.compile(input).await?
        };

        match CompilerOutput::from_value(&raw)? {
            CompilerOutput::Ok { contracts, sources } => Ok(CompileResult {
                build,
                contracts,
                sources,
                raw,
            }),
            CompilerOutput::Err { errors } => Err(Error::Compilation(errors)),
        }
    }
}
