//! Shared chain tip tracking.
//!
//! `ChainTipState` is the single source of truth for the latest ingested block, the synced
//! height, the node's best height and the derived chain statistics. Every worker holds an
//! `Arc<ChainTipState>`; the read surface only uses the `#[must_use]` readers.

use crate::{
    cache::types::BlockSummary,
    types::{ChainInfo, TxStatsComposite},
};
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::trace;

/// Returns the current unix timestamp in seconds.
fn current_unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Shared chain tip, sync progress and chain statistics.
///
/// # Thread Safety
///
/// All methods are thread-safe. Snapshots (`latest_summary`, `chain_info`, `tx_stats`) use
/// `ArcSwap` so readers never block writers. Heights are plain atomics with
/// `Acquire`/`Release` ordering. Tip updates are serialized through `tip_write_lock`.
///
/// The pending-broadcast flag is the only read-modify-write state contended by two
/// independent loops (ingestion marks it, the broadcast coordinator consumes it), so it
/// sits behind its own mutex: a mark racing a take is either consumed by that take or left
/// set for the next one, never lost and never consumed twice.
///
/// # Example
///
/// ```
/// use explorer_core::chain::ChainTipState;
///
/// let state = ChainTipState::new();
/// state.mark_pending_broadcast();
/// state.mark_pending_broadcast();
///
/// assert!(state.take_and_clear_pending_broadcast());
/// assert!(!state.take_and_clear_pending_broadcast());
/// ```
pub struct ChainTipState {
    /// Summary of the most recently ingested tip block.
    tip: ArcSwapOption<BlockSummary>,

    /// Serializes tip updates so the height comparison and store happen together.
    tip_write_lock: Mutex<()>,

    /// Highest height the engine has finished ingesting.
    synced_height: AtomicU64,

    /// Best height reported by the node. Only ever increases.
    node_height: AtomicU64,

    chain_info: ArcSwap<ChainInfo>,
    tx_stats: ArcSwap<TxStatsComposite>,

    pending_broadcast: Mutex<bool>,

    /// Unix timestamp (seconds) of the last tip update.
    last_tip_update: AtomicU64,
}

impl ChainTipState {
    /// Creates a new `ChainTipState` with heights at zero and empty snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tip: ArcSwapOption::empty(),
            tip_write_lock: Mutex::new(()),
            synced_height: AtomicU64::new(0),
            node_height: AtomicU64::new(0),
            chain_info: ArcSwap::from_pointee(ChainInfo::default()),
            tx_stats: ArcSwap::from_pointee(TxStatsComposite::default()),
            pending_broadcast: Mutex::new(false),
            last_tip_update: AtomicU64::new(current_unix_timestamp()),
        }
    }

    /// Height the engine has finished ingesting.
    #[inline]
    #[must_use]
    pub fn synced_height(&self) -> u64 {
        self.synced_height.load(Ordering::Acquire)
    }

    /// Best height the node has reported, via the tip or chain info.
    #[inline]
    #[must_use]
    pub fn node_height(&self) -> u64 {
        self.node_height.load(Ordering::Acquire)
    }

    /// Summary of the latest ingested tip, if any block was ingested yet.
    #[inline]
    #[must_use]
    pub fn latest_summary(&self) -> Option<Arc<BlockSummary>> {
        self.tip.load_full()
    }

    /// Latest chain info snapshot.
    #[inline]
    #[must_use]
    pub fn chain_info(&self) -> Arc<ChainInfo> {
        self.chain_info.load_full()
    }

    /// Latest transaction statistics snapshot.
    #[inline]
    #[must_use]
    pub fn tx_stats(&self) -> Arc<TxStatsComposite> {
        self.tx_stats.load_full()
    }

    /// Seconds since the last tip update.
    #[inline]
    #[must_use]
    pub fn tip_age_seconds(&self) -> u64 {
        let last_update = self.last_tip_update.load(Ordering::Acquire);
        current_unix_timestamp().saturating_sub(last_update)
    }

    /// Records a newly ingested tip block and advances the synced height to it.
    ///
    /// Rejects summaries below the current tip. A summary at the same height replaces the
    /// current one, which is how a repaired tip becomes visible.
    ///
    /// # Returns
    ///
    /// `true` if the tip was updated.
    pub fn update_tip(&self, summary: Arc<BlockSummary>) -> bool {
        let _guard = self.tip_write_lock.lock();

        if let Some(current) = self.tip.load().as_ref() {
            if summary.height < current.height {
                return false;
            }
        }

        let height = summary.height;
        self.tip.store(Some(summary));
        self.synced_height.fetch_max(height, Ordering::AcqRel);
        self.last_tip_update.store(current_unix_timestamp(), Ordering::Release);
        trace!(height = height, "chain tip updated");
        true
    }

    /// Sets the synced height unconditionally. Used once at startup.
    pub fn set_synced_height(&self, height: u64) {
        let _guard = self.tip_write_lock.lock();
        self.synced_height.store(height, Ordering::Release);
        trace!(height = height, "synced height set");
    }

    /// Raises the synced height to `height` if it is higher.
    ///
    /// # Returns
    ///
    /// `true` if the synced height moved.
    pub fn advance_synced_height(&self, height: u64) -> bool {
        let previous = self.synced_height.fetch_max(height, Ordering::AcqRel);
        previous < height
    }

    /// Raises the node's best height if `height` is higher.
    pub fn observe_node_height(&self, height: u64) {
        let previous = self.node_height.fetch_max(height, Ordering::AcqRel);
        if previous < height {
            trace!(height = height, "node height advanced");
        }
    }

    /// Stores a fresh chain info snapshot.
    ///
    /// Fills in the next superblock height and raises the node height from `blocks`.
    pub fn update_chain_info(&self, mut info: ChainInfo) {
        info.next_super_block = ChainInfo::next_superblock_after(info.blocks);
        self.observe_node_height(info.blocks);
        self.chain_info.store(Arc::new(info));
    }

    /// Stores a fresh transaction statistics snapshot.
    pub fn update_tx_stats(&self, stats: TxStatsComposite) {
        self.tx_stats.store(Arc::new(stats));
    }

    /// Records that subscribers should receive the current chain info.
    pub fn mark_pending_broadcast(&self) {
        *self.pending_broadcast.lock() = true;
    }

    /// Atomically reads and clears the pending-broadcast flag.
    ///
    /// Any number of marks between two calls yield exactly one `true`.
    #[must_use]
    pub fn take_and_clear_pending_broadcast(&self) -> bool {
        std::mem::take(&mut *self.pending_broadcast.lock())
    }
}

impl Default for ChainTipState {
    fn default() -> Self {
        Self::new()
    }
}
