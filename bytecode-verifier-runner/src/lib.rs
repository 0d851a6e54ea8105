mod rpc;
mod run;
mod settings;
mod store;

pub use rpc::JsonRpcClient;
pub use run::run;
pub use settings::{CompilersSettings, ContractsSettings, RpcSettings, Settings};
pub use store::FsContractStore;
