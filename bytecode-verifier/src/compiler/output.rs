use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Contracts by source file and contract name.
pub type Contracts = BTreeMap<String, BTreeMap<String, CompiledContract>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContract {
    #[serde(default)]
    pub abi: Value,
    #[serde(default)]
    pub evm: Evm,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default)]
    pub bytecode: BytecodeObject,
    #[serde(default)]
    pub deployed_bytecode: BytecodeObject,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeObject {
    #[serde(default)]
    pub object: String,
}

/// Standard-json output of the compiler, reduced to what verification needs.
#[derive(Clone, Debug, PartialEq)]
pub enum CompilerOutput {
    Ok {
        contracts: Contracts,
        sources: BTreeMap<String, Value>,
    },
    Err {
        errors: Vec<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    contracts: Contracts,
    #[serde(default)]
    sources: BTreeMap<String, Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

fn is_error(error: &Value) -> bool {
    error.get("severity").and_then(Value::as_str) == Some("error")
}

impl CompilerOutput {
    /// Interprets output of an external process; any shape mismatch is an error.
    pub fn from_value(raw: &Value) -> Result<Self, anyhow::Error> {
        let output: RawOutput =
            serde_path_to_error::deserialize(raw).context("deserializing compiler output")?;

        let has_errors = output.errors.iter().any(is_error);
        if has_errors || (output.contracts.is_empty() && !output.errors.is_empty()) {
            return Ok(CompilerOutput::Err {
                errors: output.errors,
            });
        }
        Ok(CompilerOutput::Ok {
            contracts: output.contracts,
            sources: output.sources,
        })
    }
}

/// Searches the contract by name, optionally restricted to a single source file.
pub fn find_contract<'a>(
    contracts: &'a Contracts,
    contract_name: &str,
    source_path: Option<&str>,
) -> Option<(&'a str, &'a CompiledContract)> {
    contracts
        .iter()
        .filter(|(file, _)| source_path.map_or(true, |path| path == file.as_str()))
        .find_map(|(file, contracts)| {
            contracts
                .get(contract_name)
                .map(|contract| (file.as_str(), contract))
        })
}

/// Human readable summary of compiler errors.
pub fn format_errors(errors: &[Value]) -> String {
    errors
        .iter()
        .map(|error| {
            error
                .get("formattedMessage")
                .or_else(|| error.get("message"))
                .and_then(Value::as_str)
                .map(|message| message.trim().to_string())
                .unwrap_or_else(|| error.to_string())
        })
        .collect::<Vec<_>>()
        .join("; ")
}
