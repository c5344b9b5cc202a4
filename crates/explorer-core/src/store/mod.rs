//! Persisted block store used in persisted mode.
//!
//! [`BlockStore`] is the narrow surface the sync engine needs. Hashes and raw payloads cross
//! it as lower-case hex strings; [`SqliteBlockStore`] stores them as BLOBs.

pub mod sqlite;

pub use sqlite::SqliteBlockStore;

use crate::cache::types::{BlockSummary, FullBlock, ProofType};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a block store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("no block stored at height {0}")]
    NotFound(u64),
}

/// Stored representation of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub height: u64,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub size: u64,
    pub weight: u64,
    pub proof_type: ProofType,
    pub time: i64,
    pub median_time: i64,
    pub tx_count: u32,
    /// Set once the block and all its transactions are stored.
    pub synced: bool,
}

impl BlockRow {
    /// Unsynced row for a block fetched from the node.
    #[must_use]
    pub fn from_block(block: &FullBlock) -> Self {
        let summary = &block.summary;
        Self {
            height: summary.height,
            hash: summary.hash.clone(),
            previous_hash: block.previous_hash.clone(),
            size: summary.size,
            weight: summary.weight,
            proof_type: summary.proof_type,
            time: summary.time,
            median_time: summary.median_time,
            tx_count: summary.tx_count,
            synced: false,
        }
    }

    #[must_use]
    pub fn to_summary(&self) -> Arc<BlockSummary> {
        Arc::new(BlockSummary {
            height: self.height,
            hash: self.hash.clone(),
            size: self.size,
            weight: self.weight,
            proof_type: self.proof_type,
            time: self.time,
            median_time: self.median_time,
            tx_count: self.tx_count,
        })
    }
}

/// Relational persistence surface consumed by the persisted ingestion strategy.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Highest stored block, optionally only among fully synced ones.
    async fn get_latest_block(&self, only_synced: bool) -> Result<Option<BlockRow>, StoreError>;

    async fn get_block(&self, height: u64) -> Result<Option<BlockRow>, StoreError>;

    async fn insert_block(&self, row: &BlockRow) -> Result<(), StoreError>;

    async fn set_sync_state(&self, height: u64, synced: bool) -> Result<(), StoreError>;

    /// Stores the block's txids in order.
    ///
    /// Re-storing the same block is a no-op. A txid already stored under another height is
    /// moved to `height`.
    async fn insert_transactions(&self, height: u64, txids: &[String]) -> Result<(), StoreError>;

    /// Overwrites the row at `row.height` and replaces its transactions atomically.
    ///
    /// Only transaction rows still owned by `row.height` are removed.
    async fn update_block(&self, row: &BlockRow, txids: &[String]) -> Result<(), StoreError>;

    /// Raw transaction hex by txid.
    async fn get_raw_tx(&self, txid: &str) -> Result<Option<String>, StoreError>;

    /// Raw transaction hex for every txid found, as `(txid, hex)` pairs.
    async fn get_raw_txs(&self, txids: &[String]) -> Result<Vec<(String, String)>, StoreError>;

    async fn insert_raw_tx(&self, txid: &str, hex: &str) -> Result<(), StoreError>;
}
