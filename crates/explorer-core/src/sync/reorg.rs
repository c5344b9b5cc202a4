//! Trailing-window reorg detection and repair.
//!
//! After each tick the last `orphan_window` heights are compared against the node. Any
//! height whose canonical hash differs from the stored one is re-fetched and overwritten
//! through the active [`CanonicalView`]. Repairs are idempotent: once a height matches the
//! node again it is left alone.

use crate::{
    cache::types::FullBlock,
    config::SyncMode,
    metrics::MetricsCollector,
    store::{BlockRow, BlockStore},
    sync::{cancellable, SyncContext, SyncError},
    upstream::{BlockVerbosity, NodeRpc},
};
use async_trait::async_trait;
use std::{ops::RangeInclusive, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The mode's source of truth, as seen by the reorg detector.
#[async_trait]
pub trait CanonicalView: Send + Sync {
    fn mode(&self) -> SyncMode;

    /// Hash recorded at `height`, `None` if nothing is recorded.
    async fn stored_hash(&self, height: u64) -> Result<Option<String>, SyncError>;

    /// Whether a height with nothing recorded should be fetched and filled in.
    fn fills_missing(&self) -> bool;

    /// How much of each replacement block to fetch.
    fn verbosity(&self) -> BlockVerbosity;

    /// Overwrites the record at `block.height()` with the node's canonical block.
    async fn repair(&self, block: FullBlock) -> Result<(), SyncError>;
}

/// Result of one window check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorgReport {
    /// Heights whose stored hash matched the node.
    pub matched: Vec<u64>,
    /// Heights skipped because the node or the view had no answer.
    pub skipped: Vec<u64>,
    /// Heights whose stale record was replaced.
    pub repaired: Vec<u64>,
    /// Heights that had no record and were filled in.
    pub filled: Vec<u64>,
}

/// Compares the trailing window against the node and repairs divergences.
#[derive(Clone)]
pub struct ReorgDetector {
    node: Arc<dyn NodeRpc>,
    metrics: MetricsCollector,
}

impl ReorgDetector {
    #[must_use]
    pub fn new(node: Arc<dyn NodeRpc>, metrics: MetricsCollector) -> Self {
        Self { node, metrics }
    }

    /// Checks every height in `range`, ascending.
    ///
    /// Per-height failures are logged and skipped; the next tick re-checks the window.
    ///
    /// # Errors
    ///
    /// Only [`SyncError::Cancelled`] is returned.
    pub async fn check_window(
        &self,
        view: &dyn CanonicalView,
        range: RangeInclusive<u64>,
        cancel: &CancellationToken,
    ) -> Result<ReorgReport, SyncError> {
        let mode = view.mode().as_str();
        let mut report = ReorgReport::default();

        for height in range {
            let canonical = match cancellable(cancel, self.node.get_block_hash(height)).await {
                Ok(Some(hash)) => hash,
                Ok(None) => {
                    report.skipped.push(height);
                    continue;
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(mode = mode, height = height, error = %e, "reorg check hash lookup failed");
                    report.skipped.push(height);
                    continue;
                }
            };

            let stored = match view.stored_hash(height).await {
                Ok(stored) => stored,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(mode = mode, height = height, error = %e, "reorg check read failed");
                    report.skipped.push(height);
                    continue;
                }
            };

            let filling = match stored {
                Some(stored) if stored.eq_ignore_ascii_case(&canonical) => {
                    report.matched.push(height);
                    continue;
                }
                Some(stored) => {
                    warn!(
                        mode = mode,
                        height = height,
                        stored = %stored,
                        canonical = %canonical,
                        "reorg detected"
                    );
                    false
                }
                None if view.fills_missing() => true,
                None => {
                    report.skipped.push(height);
                    continue;
                }
            };

            let block = match cancellable(cancel, self.node.get_block(&canonical, view.verbosity()))
                .await
            {
                Ok(Some(block)) => block,
                Ok(None) => {
                    warn!(mode = mode, height = height, hash = %canonical, "replacement block missing");
                    report.skipped.push(height);
                    continue;
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(mode = mode, height = height, error = %e, "replacement block fetch failed");
                    report.skipped.push(height);
                    continue;
                }
            };

            match view.repair(block).await {
                Ok(()) if filling => report.filled.push(height),
                Ok(()) => {
                    self.metrics.record_reorg_repair(view.mode().as_str());
                    report.repaired.push(height);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(mode = mode, height = height, error = %e, "reorg repair failed");
                    report.skipped.push(height);
                }
            }
        }

        Ok(report)
    }
}

/// Canonical view over the in-memory block cache.
pub struct CacheView {
    ctx: SyncContext,
}

impl CacheView {
    #[must_use]
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CanonicalView for CacheView {
    fn mode(&self) -> SyncMode {
        SyncMode::CacheOnly
    }

    async fn stored_hash(&self, height: u64) -> Result<Option<String>, SyncError> {
        Ok(self.ctx.block_cache.get(height).map(|cached| cached.hash.clone()))
    }

    fn fills_missing(&self) -> bool {
        true
    }

    fn verbosity(&self) -> BlockVerbosity {
        BlockVerbosity::Transactions
    }

    async fn repair(&self, block: FullBlock) -> Result<(), SyncError> {
        self.ctx.refresh_cached(&Arc::new(block), true);
        Ok(())
    }
}

/// Canonical view over the relational store.
///
/// Heights missing from the store are left to the forward sync. Repaired rows are marked
/// synced and any cached copy is refreshed.
pub struct StoreView {
    ctx: SyncContext,
    store: Arc<dyn BlockStore>,
}

impl StoreView {
    #[must_use]
    pub fn new(ctx: SyncContext, store: Arc<dyn BlockStore>) -> Self {
        Self { ctx, store }
    }
}

#[async_trait]
impl CanonicalView for StoreView {
    fn mode(&self) -> SyncMode {
        SyncMode::Persisted
    }

    async fn stored_hash(&self, height: u64) -> Result<Option<String>, SyncError> {
        Ok(self.store.get_block(height).await?.map(|row| row.hash))
    }

    fn fills_missing(&self) -> bool {
        false
    }

    fn verbosity(&self) -> BlockVerbosity {
        BlockVerbosity::TxIds
    }

    async fn repair(&self, block: FullBlock) -> Result<(), SyncError> {
        let mut row = BlockRow::from_block(&block);
        row.synced = true;
        self.store.update_block(&row, &block.txids()).await?;
        self.ctx.refresh_cached(&Arc::new(block), false);
        Ok(())
    }
}
