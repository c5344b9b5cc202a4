use crate::{
    config::SyncMode,
    store::{BlockRow, BlockStore},
    sync::{
        cancellable,
        reorg::{ReorgDetector, StoreView},
        IngestionStrategy, SyncContext, SyncError, TickOutcome,
    },
    upstream::BlockVerbosity,
};
use async_trait::async_trait;
use std::{collections::HashSet, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Writes every block through to the relational store.
///
/// The store is the source of truth: each tick resumes one past the highest block marked
/// synced, so a crash mid-batch re-ingests at most the blocks that never reached the synced
/// state. A block is marked synced only after its row and all its transactions are stored.
pub struct PersistedStrategy {
    ctx: SyncContext,
    store: Arc<dyn BlockStore>,
    detector: ReorgDetector,
    view: StoreView,
    batch_size: u64,
    store_raw_transactions: bool,
}

impl PersistedStrategy {
    #[must_use]
    pub fn new(
        ctx: SyncContext,
        store: Arc<dyn BlockStore>,
        batch_size: u64,
        store_raw_transactions: bool,
    ) -> Self {
        let detector = ReorgDetector::new(Arc::clone(&ctx.node), ctx.metrics);
        let view = StoreView::new(ctx.clone(), Arc::clone(&store));
        Self { ctx, store, detector, view, batch_size: batch_size.max(1), store_raw_transactions }
    }

    /// Ingests one height.
    ///
    /// Returns `Ok(false)` when the node has nothing at `height` yet.
    async fn ingest_height(
        &self,
        height: u64,
        cancel: &CancellationToken,
    ) -> Result<bool, SyncError> {
        let node = &self.ctx.node;
        let Some(hash) = cancellable(cancel, node.get_block_hash(height)).await? else {
            return Ok(false);
        };
        let Some(block) = cancellable(cancel, node.get_block(&hash, BlockVerbosity::TxIds)).await?
        else {
            return Ok(false);
        };

        if self.store.get_block(height).await?.is_none() {
            self.store.insert_block(&BlockRow::from_block(&block)).await?;
        }

        let txids = block.txids();
        self.store.insert_transactions(height, &txids).await?;
        if self.store_raw_transactions {
            self.store_raw_transactions(&txids, cancel).await?;
        }
        self.store.set_sync_state(height, true).await?;

        self.ctx.publish_new_tip(Arc::new(block)).await;
        self.ctx.metrics.record_block_ingested(SyncMode::Persisted.as_str(), height);
        Ok(true)
    }

    /// Fetches and stores raw hex for every txid the store does not have yet.
    async fn store_raw_transactions(
        &self,
        txids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let known: HashSet<String> =
            self.store.get_raw_txs(txids).await?.into_iter().map(|(txid, _)| txid).collect();

        for txid in txids.iter().filter(|txid| !known.contains(txid.as_str())) {
            let hex = cancellable(cancel, self.ctx.node.get_raw_transaction(txid))
                .await?
                .ok_or_else(|| SyncError::MissingTransaction(txid.clone()))?;
            self.store.insert_raw_tx(txid, &hex).await?;
        }
        Ok(())
    }

    async fn next_height(&self) -> Result<u64, SyncError> {
        let latest = self.store.get_latest_block(true).await?;
        Ok(latest.map_or(0, |row| row.height) + 1)
    }
}

#[async_trait]
impl IngestionStrategy for PersistedStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Persisted
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<u64, SyncError> {
        let Some(latest) = self.store.get_latest_block(true).await? else {
            info!("persisted sync starting from an empty store");
            return Ok(0);
        };

        let summary = latest.to_summary();
        self.ctx.chain_state.set_synced_height(latest.height);
        self.ctx.recent_blocks.insert(Arc::clone(&summary));
        self.ctx.chain_state.update_tip(summary);

        info!(height = latest.height, hash = %latest.hash, "persisted sync resuming");
        Ok(latest.height)
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome, SyncError> {
        let start = self.next_height().await?;
        let mut outcome = TickOutcome::idle();

        for height in start..start + self.batch_size {
            match self.ingest_height(height, cancel).await {
                Ok(true) => outcome.ingested.push(height),
                Ok(false) => break,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e @ SyncError::Store(_)) => {
                    error!(height = height, error = %e, "block store write failed, ending batch");
                    self.ctx.metrics.record_tick_failure("persisted_ingest");
                    break;
                }
                Err(e) => {
                    warn!(height = height, error = %e, "block ingestion failed, ending batch");
                    self.ctx.metrics.record_tick_failure("persisted_ingest");
                    break;
                }
            }
        }

        if !outcome.ingested.is_empty() {
            debug!(from = start, count = outcome.ingested.len(), "persisted batch stored");
        }

        // One pass covering each ingested height and the orphan window behind the first one.
        let first = outcome.ingested.first().copied().unwrap_or(start);
        let last = outcome.ingested.last().copied().unwrap_or(start - 1);
        let window = first.saturating_sub(self.ctx.orphan_window)..=last;
        let report = self.detector.check_window(&self.view, window, cancel).await?;
        outcome.repaired = report.repaired;

        Ok(outcome)
    }
}
