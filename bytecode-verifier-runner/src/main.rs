use anyhow::Context;
use blockscout_service_launcher::launcher::ConfigSettings;
use bytecode_verifier_runner::Settings;

fn main() -> Result<(), anyhow::Error> {
    // The wasm compiler worker is this same executable started with the sentinel set.
    if std::env::var_os(bytecode_verifier::WASM_WORKER_SENTINEL).is_some() {
        bytecode_verifier::run_wasm_worker();
    }

    let settings = Settings::build().context("failed to read config")?;
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(bytecode_verifier_runner::run(settings))
}
