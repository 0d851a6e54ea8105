use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Immutable key of a deployed contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractIdentity {
    pub chain_id: u64,
    pub address: String,
}

impl ContractIdentity {
    pub fn new(chain_id: u64, address: impl Into<String>) -> Self {
        Self {
            chain_id,
            address: address.into(),
        }
    }
}

impl Display for ContractIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.address)
    }
}
