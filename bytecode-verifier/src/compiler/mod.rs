mod architecture;
mod build_resolver;
mod compilers;
mod download_cache;
mod executor;
mod fetcher;
mod name;
mod output;
mod release_catalog;

pub use architecture::{Architecture, ArchitectureConfig};
pub use build_resolver::{BuildInfo, BuildResolver};
pub use compilers::{CompileResult, Compilers, CompilersConfig, Error};
pub use download_cache::{validate_filename, ArtifactCache, DownloadRequest};
pub use executor::{
    wasm, CompilerExecutor, ExecutionLimits, ExecutionMode, ExecutorError, NativeExecutor,
    WasmExecutor, WorkerCommand,
};
pub use fetcher::FetchError;
pub use name::{CompilerNameDetail, ParseError};
pub use output::{find_contract, format_errors, BytecodeObject, CompiledContract, CompilerOutput, Contracts, Evm};
pub use release_catalog::{Build, Catalog, ReleaseCatalog};
