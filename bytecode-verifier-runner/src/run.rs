use crate::{rpc::JsonRpcClient, settings::Settings, store::FsContractStore};
use anyhow::Context;
use blockscout_service_launcher::tracing::init_logs;
use bytecode_verifier::{
    compiler::{
        ArtifactCache, BuildResolver, Compilers, CompilersConfig, ReleaseCatalog, WorkerCommand,
    },
    pipeline::PipelineCoordinator,
    verifier::VerificationEngine,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

const SERVICE_NAME: &str = "bytecode_verifier";

pub async fn run(settings: Settings) -> Result<(), anyhow::Error> {
    init_logs(SERVICE_NAME, &settings.tracing, &settings.jaeger)?;

    let client = reqwest::Client::builder()
        .timeout(settings.rpc.request_timeout)
        .build()?;
    let rpc = JsonRpcClient::new(client, settings.rpc.urls.clone());

    let download_client = reqwest::Client::new();
    let catalog = settings.compilers.list_urls.iter().fold(
        ReleaseCatalog::new(
            download_client.clone(),
            settings.compilers.binaries_host.clone(),
        ),
        |catalog, (architecture, url)| catalog.with_list_url(*architecture, url.clone()),
    );
    let compilers = Compilers::new(
        BuildResolver::new(Arc::new(catalog)),
        ArtifactCache::new(settings.compilers.dir.clone(), download_client),
        CompilersConfig {
            native_architecture: settings.compilers.native_architecture(),
            execution_mode: settings.compilers.execution_mode,
            limits: settings.compilers.limits(),
            wasm_worker: WorkerCommand::current_exe(settings.compilers.js_runtime.clone())
                .context("locating current executable for wasm worker")?,
        },
        Arc::new(Semaphore::new(settings.compilers.max_threads.get())),
    );

    let coordinator = PipelineCoordinator::new(
        Arc::new(FsContractStore::new(settings.contracts.root.clone())),
        Arc::new(compilers),
        Arc::new(VerificationEngine::new(Arc::new(rpc))),
        settings.pipeline,
    );
    let summary = coordinator.run().await?;

    tracing::info!(
        total = summary.total(),
        verified = summary.verified,
        failed = summary.failed,
        "done"
    );
    Ok(())
}
