use crate::{
    cache::{
        types::{BlockSummary, CacheStats, FullBlock},
        BlockCache, RecentBlocksRing,
    },
    chain::ChainTipState,
    types::{ChainInfo, TxStatsComposite},
};
use std::sync::Arc;

/// Read-only view over the engine's in-memory state.
///
/// Every method is a lock-free or short-lock read. Nothing here calls the node; a miss is a
/// miss.
#[derive(Clone)]
pub struct ExplorerReader {
    chain_state: Arc<ChainTipState>,
    block_cache: Arc<BlockCache>,
    recent_blocks: Arc<RecentBlocksRing>,
}

impl ExplorerReader {
    #[must_use]
    pub fn new(
        chain_state: Arc<ChainTipState>,
        block_cache: Arc<BlockCache>,
        recent_blocks: Arc<RecentBlocksRing>,
    ) -> Self {
        Self { chain_state, block_cache, recent_blocks }
    }

    /// Summary at `height` from the recent ring, falling back to the block cache.
    #[must_use]
    pub fn summary_by_height(&self, height: u64) -> Option<Arc<BlockSummary>> {
        self.recent_blocks
            .get(height)
            .or_else(|| self.block_cache.get(height).map(|cached| cached.block.to_summary()))
    }

    #[must_use]
    pub fn full_block_by_height(&self, height: u64) -> Option<Arc<FullBlock>> {
        self.block_cache.get(height).map(|cached| Arc::clone(&cached.block))
    }

    #[must_use]
    pub fn latest_summary(&self) -> Option<Arc<BlockSummary>> {
        self.chain_state.latest_summary()
    }

    /// Up to `count` summaries, most recent first.
    #[must_use]
    pub fn latest_summaries(&self, count: usize) -> Vec<Arc<BlockSummary>> {
        self.recent_blocks.latest(count)
    }

    #[must_use]
    pub fn chain_info(&self) -> Arc<ChainInfo> {
        self.chain_state.chain_info()
    }

    #[must_use]
    pub fn tx_stats(&self) -> Arc<TxStatsComposite> {
        self.chain_state.tx_stats()
    }

    #[must_use]
    pub fn synced_height(&self) -> u64 {
        self.chain_state.synced_height()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        let bounds = self.block_cache.bounds();
        CacheStats {
            block_cache_size: self.block_cache.len(),
            recent_blocks_size: self.recent_blocks.len(),
            lowest_cached_height: bounds.map(|(lo, _)| lo),
            highest_cached_height: bounds.map(|(_, hi)| hi),
        }
    }
}
