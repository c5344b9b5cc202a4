//! Chain synchronization engine.
//!
//! # Architecture
//!
//! ```text
//!                  ┌────────────────────────────┐
//!                  │   ChainSyncOrchestrator    │
//!                  │ initialize → tick → delay  │
//!                  └─────────────┬──────────────┘
//!                                │ Arc<dyn IngestionStrategy>
//!                ┌───────────────┴────────────────┐
//!                ▼                                ▼
//!      ┌───────────────────┐           ┌────────────────────┐
//!      │ CacheOnlyStrategy │           │ PersistedStrategy  │
//!      │ one height / tick │           │ batch / tick       │
//!      └─────────┬─────────┘           └──────────┬─────────┘
//!                │      ReorgDetector over the     │
//!                └────── trailing window ──────────┘
//! ```
//!
//! The mode is chosen once at construction: the orchestrator never branches on it.
//!
//! # Error Handling
//!
//! A tick classifies its own failures. Cancellation unwinds silently; anything else is
//! logged, counted and retried at the next cadence. No error escapes the loop.

pub mod cache_only;
pub mod chain_info;
pub mod persisted;
pub mod reorg;
pub mod stats;

pub use cache_only::CacheOnlyStrategy;
pub use chain_info::ChainInfoWorker;
pub use persisted::PersistedStrategy;
pub use reorg::{CanonicalView, ReorgDetector, ReorgReport};
pub use stats::TxStatsWorker;

use crate::{
    cache::{types::FullBlock, BlockCache, RecentBlocksRing},
    chain::ChainTipState,
    config::SyncMode,
    metrics::MetricsCollector,
    push::{BlockUpdate, PushChannel},
    store::StoreError,
    upstream::{NodeRpc, UpstreamError},
};
use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors raised inside a sync tick.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The shared cancellation token fired while the tick was suspended.
    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    /// The node returned a hash for a height but no block for that hash.
    #[error("node has no block at height {0}")]
    MissingBlock(u64),

    #[error("node has no raw transaction {0}")]
    MissingTransaction(String),

    #[error("stats offset {offset} exceeds chain height {count}")]
    StatsOffset { offset: i64, count: u64 },
}

impl SyncError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Awaits `fut` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] on cancellation, or the future's own error converted.
pub async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SyncError>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}

/// What one tick accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Heights fully ingested this tick, ascending.
    pub ingested: Vec<u64>,
    /// Heights overwritten by reorg repair.
    pub repaired: Vec<u64>,
}

impl TickOutcome {
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ingested.is_empty() && self.repaired.is_empty()
    }
}

/// One ingestion mode, driven by [`ChainSyncOrchestrator`].
#[async_trait]
pub trait IngestionStrategy: Send + Sync {
    fn mode(&self) -> SyncMode;

    /// Establishes the starting height from the mode's source of truth.
    async fn initialize(&self, cancel: &CancellationToken) -> Result<u64, SyncError>;

    /// Runs one ingestion step.
    async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome, SyncError>;
}

/// Handles shared by both strategies.
#[derive(Clone)]
pub struct SyncContext {
    pub node: Arc<dyn NodeRpc>,
    pub chain_state: Arc<ChainTipState>,
    pub block_cache: Arc<BlockCache>,
    pub recent_blocks: Arc<RecentBlocksRing>,
    pub push: Arc<dyn PushChannel>,
    pub metrics: MetricsCollector,
    pub orphan_window: u64,
}

impl SyncContext {
    /// Makes a newly ingested tip visible: caches, chain state, `blocks` topic and the
    /// pending-broadcast flag.
    ///
    /// The block cache write and the push run concurrently; a push failure is logged and
    /// never undoes the cache write.
    pub(crate) async fn publish_new_tip(&self, block: Arc<FullBlock>) {
        let height = block.height();
        let summary = block.to_summary();

        self.recent_blocks.insert(Arc::clone(&summary));
        self.chain_state.update_tip(Arc::clone(&summary));

        let cache_write = async {
            self.block_cache.set(height, block.hash(), Arc::clone(&block), true);
        };
        let push = self.push.publish_block(BlockUpdate::from(summary.as_ref()));
        let ((), pushed) = tokio::join!(cache_write, push);

        if let Err(e) = pushed {
            debug!(height = height, error = %e, "block update not delivered");
        }

        self.chain_state.mark_pending_broadcast();
    }

    /// Overwrites cached entries for `height` after a reorg repair.
    ///
    /// With `fill` unset only heights already cached are touched.
    pub(crate) fn refresh_cached(&self, block: &Arc<FullBlock>, fill: bool) {
        let height = block.height();
        let summary = block.to_summary();

        if fill || self.block_cache.get(height).is_some() {
            self.block_cache.replace_if_mismatch(height, block.hash(), Arc::clone(block));
        }
        if fill || self.recent_blocks.get(height).is_some() {
            self.recent_blocks.insert(Arc::clone(&summary));
        }
        if self.chain_state.latest_summary().is_some_and(|tip| tip.height == height) {
            self.chain_state.update_tip(summary);
        }
    }
}

/// Top-level ingestion loop.
pub struct ChainSyncOrchestrator {
    strategy: Arc<dyn IngestionStrategy>,
    metrics: MetricsCollector,
    delay: Duration,
    startup_retry_delay: Duration,
}

impl ChainSyncOrchestrator {
    #[must_use]
    pub fn new(
        strategy: Arc<dyn IngestionStrategy>,
        metrics: MetricsCollector,
        delay: Duration,
        startup_retry_delay: Duration,
    ) -> Self {
        Self { strategy, metrics, delay, startup_retry_delay }
    }

    /// Retries `initialize` until it succeeds.
    ///
    /// Returns `None` if cancelled first.
    async fn initialize(&self, cancel: &CancellationToken) -> Option<u64> {
        loop {
            match self.strategy.initialize(cancel).await {
                Ok(height) => return Some(height),
                Err(e) if e.is_cancelled() => return None,
                Err(e) => {
                    warn!(
                        mode = self.strategy.mode().as_str(),
                        error = %e,
                        retry_ms = self.startup_retry_delay.as_millis(),
                        "sync startup failed, retrying"
                    );
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.startup_retry_delay) => {}
            }
        }
    }

    /// Runs one tick and classifies its result.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> Option<TickOutcome> {
        let mode = self.strategy.mode().as_str();
        match self.strategy.tick(cancel).await {
            Ok(outcome) => {
                if !outcome.is_idle() {
                    debug!(
                        mode = mode,
                        ingested = outcome.ingested.len(),
                        repaired = outcome.repaired.len(),
                        "sync tick complete"
                    );
                }
                Some(outcome)
            }
            Err(e) if e.is_cancelled() => {
                debug!(mode = mode, "sync tick cancelled");
                None
            }
            Err(e) => {
                error!(mode = mode, error = %e, "sync tick failed");
                self.metrics.record_tick_failure("sync");
                None
            }
        }
    }

    /// Runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mode = self.strategy.mode().as_str();
        let Some(start) = self.initialize(&cancel).await else {
            info!(mode = mode, "sync cancelled during startup");
            return;
        };
        info!(mode = mode, height = start, delay_ms = self.delay.as_millis(), "sync started");

        while !cancel.is_cancelled() {
            self.run_tick(&cancel).await;

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.delay) => {}
            }
        }
        info!(mode = mode, "sync shutting down");
    }
}
