use anyhow::anyhow;
use blockscout_service_launcher::{
    launcher::ConfigSettings,
    tracing::{JaegerSettings, TracingSettings},
};
use bytecode_verifier::{
    compiler::{Architecture, ExecutionLimits, ExecutionMode},
    pipeline::PipelineSettings,
    DEFAULT_SOLC_BINARIES_HOST,
};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, DurationSeconds};
use std::{collections::BTreeMap, num::NonZeroUsize, path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub compilers: CompilersSettings,
    pub contracts: ContractsSettings,
    pub rpc: RpcSettings,
    pub tracing: TracingSettings,
    pub jaeger: JaegerSettings,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilersSettings {
    pub dir: PathBuf,
    pub binaries_host: Url,
    /// Overrides of `<binaries_host>/<architecture>/list.json`.
    pub list_urls: BTreeMap<Architecture, Url>,
    /// When disabled, only wasm builds are used.
    pub use_native: bool,
    pub execution_mode: ExecutionMode,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    pub max_output_size: usize,
    pub max_threads: NonZeroUsize,
    pub js_runtime: String,
}

impl Default for CompilersSettings {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        let max_threads = std::thread::available_parallelism().unwrap_or_else(|e| {
            tracing::warn!("cannot get number of CPU cores: {}", e);
            NonZeroUsize::MIN
        });
        Self {
            dir: default_compilers_dir("solidity-compilers"),
            binaries_host: Url::parse(DEFAULT_SOLC_BINARIES_HOST).expect("valid default url"),
            list_urls: BTreeMap::new(),
            use_native: true,
            execution_mode: ExecutionMode::default(),
            timeout: limits.timeout,
            max_output_size: limits.max_output_size,
            max_threads,
            js_runtime: "node".to_string(),
        }
    }
}

impl CompilersSettings {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: self.timeout,
            max_output_size: self.max_output_size,
        }
    }

    pub fn native_architecture(&self) -> Option<Architecture> {
        if self.use_native {
            Architecture::native_for_host()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractsSettings {
    /// Holds `<chain_id>/<address>/{config.json,input.json}` per contract.
    pub root: PathBuf,
}

impl Default for ContractsSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("contracts"),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcSettings {
    /// Node endpoint by chain id.
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub urls: BTreeMap<u64, Url>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            urls: BTreeMap::new(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "BYTECODE_VERIFIER";

    fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.workers == 0 {
            return Err(anyhow!("pipeline.workers should be positive"));
        }
        if self.rpc.urls.is_empty() {
            return Err(anyhow!("at least one rpc url should be configured"));
        }
        Ok(())
    }
}

fn default_compilers_dir<P: AsRef<std::path::Path>>(path: P) -> PathBuf {
    let mut compilers_dir = std::env::temp_dir();
    compilers_dir.push(path);
    compilers_dir
}
