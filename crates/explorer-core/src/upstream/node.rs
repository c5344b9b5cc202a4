use crate::{
    cache::types::FullBlock,
    config::NodeConfig,
    types::{ChainInfo, ChainTxStats, JsonRpcRequest, JsonRpcResponse, NodeBlock},
    upstream::{
        http_client::{HttpClient, HttpClientConfig},
        UpstreamError,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::trace;

/// Detail level requested from `getblock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVerbosity {
    /// Transactions as txids.
    TxIds,
    /// Transactions decoded, including raw hex.
    Transactions,
}

impl BlockVerbosity {
    #[must_use]
    pub fn as_rpc(&self) -> u8 {
        match self {
            Self::TxIds => 1,
            Self::Transactions => 2,
        }
    }
}

/// Blockchain node RPC surface consumed by the engine.
///
/// Heights and hashes beyond the node's tip are `Ok(None)`, never errors.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Current best height (`getblockcount`).
    async fn get_best_height(&self) -> Result<u64, UpstreamError>;

    /// Hash of the active-chain block at `height` (`getblockhash`).
    async fn get_block_hash(&self, height: u64) -> Result<Option<String>, UpstreamError>;

    /// Full block by hash (`getblock`).
    async fn get_block(
        &self,
        hash: &str,
        verbosity: BlockVerbosity,
    ) -> Result<Option<FullBlock>, UpstreamError>;

    /// Chain summary (`getblockchaininfo`).
    async fn get_chain_info(&self) -> Result<ChainInfo, UpstreamError>;

    /// Transaction statistics over the last `window` blocks (`getchaintxstats`).
    async fn get_chain_tx_stats(&self, window: u64) -> Result<ChainTxStats, UpstreamError>;

    /// Raw transaction hex (`getrawtransaction txid false`).
    async fn get_raw_transaction(&self, txid: &str) -> Result<Option<String>, UpstreamError>;
}

/// JSON-RPC client for a bitcoin-style node.
pub struct NodeClient {
    url: String,
    http: HttpClient,
    next_id: AtomicU64,
}

impl NodeClient {
    /// Creates a client for the configured node.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &NodeConfig) -> Result<Self, UpstreamError> {
        let basic_auth = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        let http = HttpClient::with_config(HttpClientConfig {
            concurrent_limit: config.concurrency_limit,
            request_timeout: Duration::from_secs(config.timeout_seconds),
            basic_auth,
            ..HttpClientConfig::default()
        })?;

        Ok(Self { url: config.url.clone(), http, next_id: AtomicU64::new(1) })
    }

    /// Issues one JSON-RPC call.
    ///
    /// Returns `Ok(None)` for a `null` result and for the node's not-found error codes.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<Option<T>, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, Some(params), id);
        let body = serde_json::to_vec(&request)
            .map_err(|e| UpstreamError::InvalidResponse(format!("request encoding: {e}")))?;

        trace!(method = method, id = id, "node rpc call");
        let bytes = self.http.send_request(&self.url, body.into()).await?;

        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = response.error {
            let err = UpstreamError::RpcError(error.code, error.message);
            if err.is_not_found() {
                trace!(method = method, code = error.code, "node reported not found");
                return Ok(None);
            }
            return Err(err);
        }

        match response.result {
            None | Some(Value::Null) => Ok(None),
            Some(result) => serde_json::from_value(result)
                .map(Some)
                .map_err(|e| UpstreamError::InvalidResponse(format!("{method}: {e}"))),
        }
    }

    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, UpstreamError> {
        self.call(method, params)
            .await?
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("{method}: empty result")))
    }
}

#[async_trait]
impl NodeRpc for NodeClient {
    async fn get_best_height(&self) -> Result<u64, UpstreamError> {
        self.call_required("getblockcount", json!([])).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<Option<String>, UpstreamError> {
        let hash: Option<String> = self.call("getblockhash", json!([height])).await?;
        Ok(hash.map(|h| h.to_ascii_lowercase()))
    }

    async fn get_block(
        &self,
        hash: &str,
        verbosity: BlockVerbosity,
    ) -> Result<Option<FullBlock>, UpstreamError> {
        let block: Option<NodeBlock> =
            self.call("getblock", json!([hash, verbosity.as_rpc()])).await?;
        Ok(block.map(FullBlock::from))
    }

    async fn get_chain_info(&self) -> Result<ChainInfo, UpstreamError> {
        self.call_required("getblockchaininfo", json!([])).await
    }

    async fn get_chain_tx_stats(&self, window: u64) -> Result<ChainTxStats, UpstreamError> {
        self.call_required("getchaintxstats", json!([window])).await
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<Option<String>, UpstreamError> {
        self.call("getrawtransaction", json!([txid, false])).await
    }
}
