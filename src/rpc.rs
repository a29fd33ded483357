//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to the node's debug tracing endpoint.
//! Every request carries a deadline so a stalled node cannot stall the
//! indexer.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// JSON-RPC client for Ethereum nodes.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client whose requests fail after `timeout`.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        reqwest::Url::parse(&url).with_context(|| format!("Invalid RPC url: {}", url))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send RPC request")?;

        let json: Value = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }

    /// Re-execute a transaction with `debug_traceTransaction`.
    ///
    /// Returns the raw `result` object. A `null` result means the node does
    /// not know the transaction (yet) and is reported as an error so the
    /// caller retries later.
    pub async fn trace_transaction(&self, tx_hash: &str) -> Result<Value> {
        let params = json!([tx_hash]);
        let result = self.call("debug_traceTransaction", params).await?;
        if result.is_null() {
            anyhow::bail!("Node returned no trace for {}", tx_hash);
        }
        Ok(result)
    }
}
