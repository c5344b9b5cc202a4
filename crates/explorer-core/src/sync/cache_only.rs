use crate::{
    config::SyncMode,
    sync::{
        cancellable,
        reorg::{CacheView, ReorgDetector},
        IngestionStrategy, SyncContext, SyncError, TickOutcome,
    },
    upstream::BlockVerbosity,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

/// Keeps only in-memory state, starting from the node's tip at startup.
///
/// Each tick ingests at most the single next height, then re-checks the trailing window
/// ending at the synced height.
pub struct CacheOnlyStrategy {
    ctx: SyncContext,
    detector: ReorgDetector,
    view: CacheView,
}

impl CacheOnlyStrategy {
    #[must_use]
    pub fn new(ctx: SyncContext) -> Self {
        let detector = ReorgDetector::new(Arc::clone(&ctx.node), ctx.metrics);
        let view = CacheView::new(ctx.clone());
        Self { ctx, detector, view }
    }
}

#[async_trait]
impl IngestionStrategy for CacheOnlyStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::CacheOnly
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<u64, SyncError> {
        let node = &self.ctx.node;
        let best = cancellable(cancel, node.get_best_height()).await?;
        let hash = cancellable(cancel, node.get_block_hash(best))
            .await?
            .ok_or(SyncError::MissingBlock(best))?;
        let block = cancellable(cancel, node.get_block(&hash, BlockVerbosity::Transactions))
            .await?
            .ok_or(SyncError::MissingBlock(best))?;

        let block = Arc::new(block);
        self.ctx.chain_state.set_synced_height(best);
        self.ctx.recent_blocks.insert(block.to_summary());
        self.ctx.chain_state.update_tip(block.to_summary());
        self.ctx.block_cache.set(best, &hash, block, true);
        self.ctx.metrics.record_node_height(best);

        info!(height = best, hash = %hash, "cache-only sync seeded from node tip");
        Ok(best)
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome, SyncError> {
        let node = &self.ctx.node;
        let next = self.ctx.chain_state.synced_height() + 1;

        let Some(hash) = cancellable(cancel, node.get_block_hash(next)).await? else {
            trace!(height = next, "no new block");
            return Ok(TickOutcome::idle());
        };
        let Some(block) =
            cancellable(cancel, node.get_block(&hash, BlockVerbosity::Transactions)).await?
        else {
            trace!(height = next, hash = %hash, "block body not available yet");
            return Ok(TickOutcome::idle());
        };

        self.ctx.publish_new_tip(Arc::new(block)).await;
        self.ctx.metrics.record_block_ingested(SyncMode::CacheOnly.as_str(), next);

        let synced = self.ctx.chain_state.synced_height();
        let window = synced.saturating_sub(self.ctx.orphan_window)..=synced;
        let report = self.detector.check_window(&self.view, window, cancel).await?;

        Ok(TickOutcome { ingested: vec![next], repaired: report.repaired })
    }
}
