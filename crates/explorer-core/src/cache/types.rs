//! Block representations held by the caches and pushed to subscribers.
//!
//! [`BlockSummary`] is the lightweight shape served by summary queries and pushed on the
//! `blocks` topic. [`FullBlock`] adds the previous-block hash and the ordered transaction list.
//! Both are immutable once built: a reorg replaces the cached `Arc` instead of mutating it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Consensus mechanism that produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofType {
    ProofOfWorkX16Rt,
    ProofOfWorkProgPow,
    ProofOfWorkRandomX,
    ProofOfWorkSha256D,
    ProofOfStake,
    #[default]
    Unknown,
}

impl ProofType {
    /// Maps the free-form proof type string reported by the node.
    ///
    /// Matching is case-insensitive and substring based, so `"Proof-of-Work (ProgPow)"` and
    /// `"progpow"` both map to [`ProofType::ProofOfWorkProgPow`].
    #[must_use]
    pub fn from_node_str(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.contains("stake") {
            Self::ProofOfStake
        } else if lower.contains("x16rt") {
            Self::ProofOfWorkX16Rt
        } else if lower.contains("progpow") {
            Self::ProofOfWorkProgPow
        } else if lower.contains("randomx") {
            Self::ProofOfWorkRandomX
        } else if lower.contains("sha256d") {
            Self::ProofOfWorkSha256D
        } else {
            Self::Unknown
        }
    }

    /// Stable label used for the persisted `proof_type` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProofOfWorkX16Rt => "pow_x16rt",
            Self::ProofOfWorkProgPow => "pow_progpow",
            Self::ProofOfWorkRandomX => "pow_randomx",
            Self::ProofOfWorkSha256D => "pow_sha256d",
            Self::ProofOfStake => "pos",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of [`ProofType::as_str`]. Unrecognised labels map to `Unknown`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "pow_x16rt" => Self::ProofOfWorkX16Rt,
            "pow_progpow" => Self::ProofOfWorkProgPow,
            "pow_randomx" => Self::ProofOfWorkRandomX,
            "pow_sha256d" => Self::ProofOfWorkSha256D,
            "pos" => Self::ProofOfStake,
            _ => Self::Unknown,
        }
    }
}

/// Lightweight block representation without transaction payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub height: u64,
    /// Lower-case hex block hash.
    pub hash: String,
    pub size: u64,
    pub weight: u64,
    pub proof_type: ProofType,
    pub time: i64,
    pub median_time: i64,
    pub tx_count: u32,
}

/// A transaction entry inside a [`FullBlock`].
///
/// The node returns bare txids for `getblock` verbosity 1 and decoded transactions for
/// verbosity 2; both shapes deserialize into this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransaction {
    Id(String),
    Detailed(Box<TransactionDetail>),
}

impl BlockTransaction {
    #[must_use]
    pub fn txid(&self) -> &str {
        match self {
            Self::Id(txid) => txid,
            Self::Detailed(detail) => &detail.txid,
        }
    }

    /// Raw transaction hex, only present for verbosity 2 payloads.
    #[must_use]
    pub fn hex(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Detailed(detail) => detail.hex.as_deref(),
        }
    }
}

/// Decoded transaction fields carried by verbosity 2 blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub txid: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub vsize: Option<u64>,
    #[serde(default)]
    pub weight: Option<u64>,
    #[serde(default)]
    pub locktime: Option<u64>,
    #[serde(default)]
    pub hex: Option<String>,
}

/// Block with its ordered transactions and parent link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullBlock {
    #[serde(flatten)]
    pub summary: BlockSummary,
    pub previous_hash: Option<String>,
    pub transactions: Vec<BlockTransaction>,
}

impl FullBlock {
    #[inline]
    #[must_use]
    pub fn height(&self) -> u64 {
        self.summary.height
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.summary.hash
    }

    /// Transaction ids in block order.
    #[must_use]
    pub fn txids(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| tx.txid().to_string()).collect()
    }

    /// Shared summary for the recent-blocks ring.
    #[must_use]
    pub fn to_summary(&self) -> Arc<BlockSummary> {
        Arc::new(self.summary.clone())
    }
}

/// Point-in-time cache occupancy, reported through the read surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub block_cache_size: usize,
    pub recent_blocks_size: usize,
    pub lowest_cached_height: Option<u64>,
    pub highest_cached_height: Option<u64>,
}
