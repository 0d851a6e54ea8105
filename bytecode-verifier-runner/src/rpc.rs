use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytecode_verifier::{bytecode::decode_hex, verifier::NodeRpc};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};
use url::Url;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// `eth_getCode` over JSON-RPC, one endpoint per chain.
pub struct JsonRpcClient {
    client: reqwest::Client,
    urls: BTreeMap<u64, Url>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, urls: BTreeMap<u64, Url>) -> Self {
        Self {
            client,
            urls,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl NodeRpc for JsonRpcClient {
    async fn get_code(&self, chain_id: u64, address: &str) -> Result<Bytes, anyhow::Error> {
        let url = self
            .urls
            .get(&chain_id)
            .ok_or_else(|| anyhow!("no rpc url configured for chain {chain_id}"))?;
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_getCode",
            "params": [address, "latest"],
        });

        let response: RpcResponse = self
            .client
            .post(url.clone())
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("eth_getCode request failed")?
            .json()
            .await
            .context("invalid json-rpc response")?;

        if let Some(error) = response.error {
            return Err(anyhow!(
                "eth_getCode returned error {}: {}{}",
                error.code,
                error.message,
                error.data.map(|data| format!(" ({data})")).unwrap_or_default()
            ));
        }
        let code = response
            .result
            .ok_or_else(|| anyhow!("json-rpc response has neither result nor error"))?;
        let code = decode_hex(&code).context("eth_getCode result is not hex")?;
        Ok(Bytes::from(code))
    }
}
