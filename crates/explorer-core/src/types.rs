//! Wire types shared by the node client, the engine and the push channel.
//!
//! The node speaks bitcoin-style JSON-RPC: lower-case, mostly unseparated field names
//! (`bestblockhash`, `mediantime`, `nTx`). Types in this module deserialize that shape and
//! serialize camelCase for subscribers.

use crate::cache::types::{BlockSummary, BlockTransaction, FullBlock, ProofType};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap};

/// JSON-RPC protocol version sent with every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// `Cow` form of [`JSONRPC_VERSION`] so request construction never allocates for it.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Heights between two superblocks.
pub const SUPERBLOCK_INTERVAL: u64 = 43_200;

/// JSON-RPC request sent to the node.
///
/// ```
/// use explorer_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("getblockhash", Some(json!([42])), 1);
/// assert_eq!(request.method, "getblockhash");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: u64) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id }
    }
}

/// JSON-RPC response returned by the node.
///
/// Bitcoin-derived nodes always send both `result` and `error`, one of them `null`, and may
/// omit the `jsonrpc` member entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: serde_json::Value,
}

/// JSON-RPC error object.
///
/// Node-specific codes that matter to the engine:
///
/// - `-8`: block height out of range
/// - `-5`: invalid address or key, returned for unknown block hashes and txids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// `getblock` result as reported by the node, for either verbosity.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeBlock {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub proof_type: Option<String>,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub mediantime: i64,
    #[serde(rename = "nTx", default)]
    pub n_tx: Option<u32>,
    #[serde(default)]
    pub previousblockhash: Option<String>,
    #[serde(default)]
    pub tx: Vec<BlockTransaction>,
}

impl From<NodeBlock> for FullBlock {
    fn from(block: NodeBlock) -> Self {
        let tx_count = block
            .n_tx
            .unwrap_or_else(|| u32::try_from(block.tx.len()).unwrap_or(u32::MAX));
        let proof_type =
            block.proof_type.as_deref().map(ProofType::from_node_str).unwrap_or_default();

        FullBlock {
            summary: BlockSummary {
                height: block.height,
                hash: block.hash.to_ascii_lowercase(),
                size: block.size,
                weight: block.weight,
                proof_type,
                time: block.time,
                median_time: block.mediantime,
                tx_count,
            },
            previous_hash: block.previousblockhash.map(|h| h.to_ascii_lowercase()),
            transactions: block.tx,
        }
    }
}

/// `getblockchaininfo` snapshot plus the derived superblock height.
///
/// Fields the engine does not interpret are kept in `extra` so the pushed summary carries
/// everything the node reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub blocks: u64,
    #[serde(default)]
    pub headers: u64,
    #[serde(default)]
    pub bestblockhash: String,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub mediantime: i64,
    #[serde(default)]
    pub verificationprogress: f64,
    #[serde(default)]
    pub chainwork: String,
    #[serde(default)]
    pub pruned: bool,
    /// Next superblock height, derived from `blocks`.
    #[serde(default)]
    pub next_super_block: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChainInfo {
    /// First superblock strictly above `blocks`.
    #[inline]
    #[must_use]
    pub fn next_superblock_after(blocks: u64) -> u64 {
        (blocks / SUPERBLOCK_INTERVAL + 1) * SUPERBLOCK_INTERVAL
    }
}

/// `getchaintxstats` result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainTxStats {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub txcount: u64,
    #[serde(default)]
    pub window_block_count: u64,
    #[serde(default)]
    pub window_tx_count: u64,
    #[serde(default)]
    pub txrate: f64,
}

/// One point of a transaction statistics series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxStatsDataPoint {
    pub x: f64,
    pub y: f64,
}

/// Transaction count and rate series for one time range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatsEntry {
    pub tx_counts: Vec<TxStatsDataPoint>,
    pub tx_rates: Vec<TxStatsDataPoint>,
    pub labels: Vec<String>,
}

/// Transaction statistics keyed by range name (`day`, `week`, `month`, `overall`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatsComposite {
    pub tx_stats: BTreeMap<String, TxStatsEntry>,
}
