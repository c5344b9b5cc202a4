//! Core component container for the explorer runtime.

use crate::{
    cache::{BlockCache, RecentBlocksRing},
    chain::ChainTipState,
    metrics::MetricsCollector,
    push::{BroadcastPushChannel, PushChannel},
    reader::ExplorerReader,
    store::BlockStore,
    sync::IngestionStrategy,
    upstream::NodeRpc,
};
use std::sync::Arc;

/// Container for all initialized explorer components.
///
/// Everything is `Arc`-shared with interior mutability where needed, so the container is
/// cheap to clone into worker tasks.
#[derive(Clone)]
pub struct ExplorerComponents {
    pub(super) chain_state: Arc<ChainTipState>,
    pub(super) block_cache: Arc<BlockCache>,
    pub(super) recent_blocks: Arc<RecentBlocksRing>,
    pub(super) node: Arc<dyn NodeRpc>,
    pub(super) store: Option<Arc<dyn BlockStore>>,
    pub(super) push: Arc<dyn PushChannel>,
    pub(super) broadcast_channel: Option<BroadcastPushChannel>,
    pub(super) strategy: Arc<dyn IngestionStrategy>,
    pub(super) metrics: MetricsCollector,
}

impl ExplorerComponents {
    #[must_use]
    pub fn chain_state(&self) -> &Arc<ChainTipState> {
        &self.chain_state
    }

    #[must_use]
    pub fn block_cache(&self) -> &Arc<BlockCache> {
        &self.block_cache
    }

    #[must_use]
    pub fn recent_blocks(&self) -> &Arc<RecentBlocksRing> {
        &self.recent_blocks
    }

    #[must_use]
    pub fn node(&self) -> &Arc<dyn NodeRpc> {
        &self.node
    }

    /// The relational store, present only in persisted mode.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn BlockStore>> {
        self.store.as_ref()
    }

    #[must_use]
    pub fn push(&self) -> &Arc<dyn PushChannel> {
        &self.push
    }

    /// The in-process channel, unless a custom push channel was injected.
    #[must_use]
    pub fn broadcast_channel(&self) -> Option<&BroadcastPushChannel> {
        self.broadcast_channel.as_ref()
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<dyn IngestionStrategy> {
        &self.strategy
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsCollector {
        self.metrics
    }

    #[must_use]
    pub fn reader(&self) -> ExplorerReader {
        ExplorerReader::new(
            Arc::clone(&self.chain_state),
            Arc::clone(&self.block_cache),
            Arc::clone(&self.recent_blocks),
        )
    }
}
