use crate::{cache::types::FullBlock, chain::ChainTipState};
use ahash::RandomState;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur during block cache operations.
#[derive(Debug, Error)]
pub enum BlockCacheError {
    /// Invalid configuration parameter.
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for block cache sizing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockCacheConfig {
    /// Heights kept below the highest cached height before older entries are pruned.
    pub max_blocks: usize,
}

impl Default for BlockCacheConfig {
    fn default() -> Self {
        Self { max_blocks: 1000 }
    }
}

/// A cached full block and the hash it was stored under.
#[derive(Debug, Clone)]
pub struct CachedBlock {
    pub hash: String,
    pub block: Arc<FullBlock>,
    pub inserted_at: DateTime<Utc>,
}

impl CachedBlock {
    fn new(hash: &str, block: Arc<FullBlock>) -> Arc<Self> {
        Arc::new(Self { hash: hash.to_ascii_lowercase(), block, inserted_at: Utc::now() })
    }
}

/// Full blocks keyed by height, with hash-based staleness validation.
///
/// Entries are immutable `Arc<CachedBlock>` values. Writers build the replacement first and
/// swap it in with a single map insert, so a reader (or a cancelled writer) always sees
/// either the previous valid entry or the new one. `DashMap` shards give per-height write
/// serialization; [`BlockCache::replace_if_mismatch`] holds the shard lock across the
/// compare and the swap.
///
/// The cache never fetches upstream. Filling it is the orchestrator's job.
pub struct BlockCache {
    config: BlockCacheConfig,
    entries: DashMap<u64, Arc<CachedBlock>, RandomState>,
    chain_state: Arc<ChainTipState>,
    highest: AtomicU64,
}

impl BlockCache {
    /// Creates a new block cache.
    ///
    /// # Errors
    ///
    /// Returns `BlockCacheError::InvalidConfig` if `max_blocks` is zero.
    pub fn new(
        config: &BlockCacheConfig,
        chain_state: Arc<ChainTipState>,
    ) -> Result<Self, BlockCacheError> {
        if config.max_blocks == 0 {
            return Err(BlockCacheError::InvalidConfig("max_blocks must be non-zero".to_string()));
        }

        Ok(Self {
            config: config.clone(),
            entries: DashMap::with_hasher(RandomState::new()),
            chain_state,
            highest: AtomicU64::new(0),
        })
    }

    /// Cached entry at `height`, or `None` on a miss.
    #[must_use]
    pub fn get(&self, height: u64) -> Option<Arc<CachedBlock>> {
        self.entries.get(&height).map(|entry| Arc::clone(entry.value()))
    }

    /// Upserts the block at `height`.
    ///
    /// With `is_new_tip` the shared synced height advances to `height`.
    pub fn set(&self, height: u64, hash: &str, block: Arc<FullBlock>, is_new_tip: bool) {
        trace!(height = height, hash = %hash, is_new_tip = is_new_tip, "caching block");

        self.entries.insert(height, CachedBlock::new(hash, block));

        if is_new_tip {
            self.chain_state.advance_synced_height(height);
        }

        let previous = self.highest.fetch_max(height, Ordering::AcqRel);
        if height > previous {
            self.prune_below_window(height);
        }
    }

    /// `true` iff an entry exists at `height` and was stored under `hash`.
    #[must_use]
    pub fn validate(&self, height: u64, hash: &str) -> bool {
        self.entries.get(&height).is_some_and(|entry| entry.hash.eq_ignore_ascii_case(hash))
    }

    /// Atomically replaces the entry at `height` unless it already carries `hash`.
    ///
    /// # Returns
    ///
    /// `true` if the entry was missing or stale and has been replaced.
    pub fn replace_if_mismatch(&self, height: u64, hash: &str, block: Arc<FullBlock>) -> bool {
        let entry = self.entries.entry(height);
        if let Entry::Occupied(ref occupied) = entry {
            if occupied.get().hash.eq_ignore_ascii_case(hash) {
                return false;
            }
        }
        entry.insert(CachedBlock::new(hash, block));
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowest and highest cached heights.
    #[must_use]
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.entries.iter().map(|entry| *entry.key()).fold(None, |acc, h| match acc {
            None => Some((h, h)),
            Some((lo, hi)) => Some((lo.min(h), hi.max(h))),
        })
    }

    fn prune_below_window(&self, highest: u64) {
        let keep = self.config.max_blocks as u64;
        let Some(cutoff) = highest.checked_sub(keep - 1) else {
            return;
        };
        let before = self.entries.len();
        if before <= self.config.max_blocks {
            return;
        }
        self.entries.retain(|height, _| *height >= cutoff);
        debug!(cutoff = cutoff, pruned = before - self.entries.len(), "pruned block cache");
    }
}
