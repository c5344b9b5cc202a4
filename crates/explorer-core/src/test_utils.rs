//! In-memory fakes for exercising the sync engine without a node.
//!
//! Enabled for unit tests and behind the `test-utils` feature for the integration suite.

use crate::{
    cache::{
        types::{BlockSummary, BlockTransaction, FullBlock, ProofType, TransactionDetail},
        BlockCache, BlockCacheConfig, RecentBlocksRing,
    },
    chain::ChainTipState,
    metrics::MetricsCollector,
    push::{BlockUpdate, PushChannel, PushError, PushMessage, Topic},
    sync::SyncContext,
    types::{ChainInfo, ChainTxStats},
    upstream::{errors::RPC_OUT_OF_RANGE, BlockVerbosity, NodeRpc, UpstreamError},
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

const GENESIS_TIME: i64 = 1_600_000_000;
const BLOCK_TIME: i64 = 120;

/// Deterministic in-memory chain answering the node RPC surface.
///
/// Heights `0..=tip` exist. Hashes and txids are 64-char lower-case hex derived from the
/// height and a fork counter, so a reorged height gets a fresh hash and fresh txids.
pub struct MockNode {
    chain: RwLock<Vec<FullBlock>>,
    forks: AtomicU64,
    failing: AtomicBool,
    hide_bodies: AtomicBool,
    fail_from_height: AtomicU64,
    block_hash_calls: AtomicUsize,
    block_calls: AtomicUsize,
    raw_transaction_calls: AtomicUsize,
}

impl MockNode {
    #[must_use]
    pub fn with_chain(tip: u64) -> Self {
        let mut chain = Vec::new();
        for height in 0..=tip {
            let previous = chain.last().map(|block: &FullBlock| block.hash().to_string());
            chain.push(Self::make_block(height, 0, previous));
        }
        Self {
            chain: RwLock::new(chain),
            forks: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            hide_bodies: AtomicBool::new(false),
            fail_from_height: AtomicU64::new(u64::MAX),
            block_hash_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
            raw_transaction_calls: AtomicUsize::new(0),
        }
    }

    fn make_block(height: u64, fork: u64, previous_hash: Option<String>) -> FullBlock {
        let tx_count = height % 3 + 1;
        let transactions = (0..tx_count)
            .map(|index| {
                let txid = format!("{height:016x}{fork:016x}{index:016x}{:016x}", 0x7e57_u64);
                BlockTransaction::Detailed(Box::new(TransactionDetail {
                    hash: Some(txid.clone()),
                    version: Some(2),
                    size: Some(250),
                    vsize: Some(250),
                    weight: Some(1_000),
                    locktime: Some(0),
                    hex: Some(format!("02000000{txid}")),
                    txid,
                }))
            })
            .collect::<Vec<_>>();

        let size = 200 + tx_count * 250;
        let time = GENESIS_TIME + i64::try_from(height).unwrap_or(i64::MAX) * BLOCK_TIME;
        FullBlock {
            summary: BlockSummary {
                height,
                hash: format!("{height:016x}{fork:016x}{:032x}", 0xb10c_u64),
                size,
                weight: size * 4,
                proof_type: if height % 2 == 0 {
                    ProofType::ProofOfStake
                } else {
                    ProofType::ProofOfWorkX16Rt
                },
                time,
                median_time: time - 6 * BLOCK_TIME,
                tx_count: u32::try_from(tx_count).unwrap_or(u32::MAX),
            },
            previous_hash,
            transactions,
        }
    }

    #[must_use]
    pub fn tip(&self) -> u64 {
        self.chain.read().len() as u64 - 1
    }

    /// Appends `count` blocks on top of the current tip.
    pub fn extend(&self, count: u64) {
        let mut chain = self.chain.write();
        for _ in 0..count {
            let height = chain.len() as u64;
            let previous = chain.last().map(|block| block.hash().to_string());
            chain.push(Self::make_block(height, 0, previous));
        }
    }

    /// Replaces the block at `height` with a fork block. Other heights are untouched.
    ///
    /// # Panics
    ///
    /// Panics if `height` is above the tip.
    pub fn reorg_at(&self, height: u64) {
        let fork = self.forks.fetch_add(1, Ordering::SeqCst) + 1;
        let mut chain = self.chain.write();
        let index = usize::try_from(height).unwrap();
        let previous = chain[index].previous_hash.clone();
        chain[index] = Self::make_block(height, fork, previous);
    }

    /// Installs `block` at its own height.
    ///
    /// # Panics
    ///
    /// Panics if the block's height is above the tip.
    pub fn replace_block(&self, block: FullBlock) {
        let index = usize::try_from(block.height()).unwrap();
        self.chain.write()[index] = block;
    }

    /// Canonical block at `height` with decoded transactions.
    #[must_use]
    pub fn block_at(&self, height: u64) -> Option<FullBlock> {
        let index = usize::try_from(height).ok()?;
        self.chain.read().get(index).cloned()
    }

    /// Makes every call fail with a connection error while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes `getblock` answer not-found while `getblockhash` keeps answering.
    pub fn set_hide_bodies(&self, hide: bool) {
        self.hide_bodies.store(hide, Ordering::SeqCst);
    }

    /// Makes `getblockhash` fail for `height` and above.
    pub fn fail_from_height(&self, height: u64) {
        self.fail_from_height.store(height, Ordering::SeqCst);
    }

    #[must_use]
    pub fn block_hash_calls(&self) -> usize {
        self.block_hash_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn raw_transaction_calls(&self) -> usize {
        self.raw_transaction_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), UpstreamError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::ConnectionFailed("mock node offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn get_best_height(&self) -> Result<u64, UpstreamError> {
        self.check_online()?;
        Ok(self.tip())
    }

    async fn get_block_hash(&self, height: u64) -> Result<Option<String>, UpstreamError> {
        self.block_hash_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if height >= self.fail_from_height.load(Ordering::SeqCst) {
            return Err(UpstreamError::Timeout);
        }
        Ok(self.block_at(height).map(|block| block.hash().to_string()))
    }

    async fn get_block(
        &self,
        hash: &str,
        verbosity: BlockVerbosity,
    ) -> Result<Option<FullBlock>, UpstreamError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.hide_bodies.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let chain = self.chain.read();
        let Some(block) = chain.iter().find(|block| block.hash().eq_ignore_ascii_case(hash))
        else {
            return Ok(None);
        };

        let mut block = block.clone();
        if verbosity == BlockVerbosity::TxIds {
            block.transactions = block
                .transactions
                .iter()
                .map(|tx| BlockTransaction::Id(tx.txid().to_string()))
                .collect();
        }
        Ok(Some(block))
    }

    async fn get_chain_info(&self) -> Result<ChainInfo, UpstreamError> {
        self.check_online()?;
        let chain = self.chain.read();
        let tip = chain.last().map(|block| block.summary.clone());
        Ok(ChainInfo {
            chain: "test".to_string(),
            blocks: chain.len() as u64 - 1,
            headers: chain.len() as u64 - 1,
            bestblockhash: tip.as_ref().map(|t| t.hash.clone()).unwrap_or_default(),
            mediantime: tip.map_or(0, |t| t.median_time),
            verificationprogress: 1.0,
            ..ChainInfo::default()
        })
    }

    async fn get_chain_tx_stats(&self, window: u64) -> Result<ChainTxStats, UpstreamError> {
        self.check_online()?;
        let chain = self.chain.read();
        let tip = chain.len() as u64 - 1;
        if window >= tip {
            return Err(UpstreamError::RpcError(
                RPC_OUT_OF_RANGE,
                "Invalid block count: should be between 0 and the block's height - 1".to_string(),
            ));
        }

        let txcount: u64 = chain.iter().map(|block| u64::from(block.summary.tx_count)).sum();
        let window_tx_count: u64 = chain
            .iter()
            .filter(|block| block.height() > tip - window)
            .map(|block| u64::from(block.summary.tx_count))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let txrate = if window == 0 {
            0.0
        } else {
            window_tx_count as f64 / (window as f64 * BLOCK_TIME as f64)
        };

        Ok(ChainTxStats {
            time: chain.last().map_or(0, |block| block.summary.time),
            txcount,
            window_block_count: window,
            window_tx_count,
            txrate,
        })
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<Option<String>, UpstreamError> {
        self.raw_transaction_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let chain = self.chain.read();
        Ok(chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .find(|tx| tx.txid() == txid)
            .and_then(|tx| tx.hex().map(str::to_string)))
    }
}

/// Push channel that records every message it is asked to publish.
#[derive(Default)]
pub struct RecordingPushChannel {
    messages: Mutex<Vec<PushMessage>>,
    failing: AtomicBool,
}

impl RecordingPushChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes publishes fail with `NoSubscribers` while set. Nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn messages(&self) -> Vec<PushMessage> {
        self.messages.lock().clone()
    }

    /// Heights of published block updates, in publish order.
    #[must_use]
    pub fn block_heights(&self) -> Vec<u64> {
        self.messages
            .lock()
            .iter()
            .filter_map(|message| match &message.payload {
                crate::push::PushPayload::Block(update) => Some(update.height),
                crate::push::PushPayload::ChainInfo(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn chain_info_count(&self) -> usize {
        self.messages.lock().iter().filter(|m| m.topic == Topic::BackgroundData).count()
    }

    fn record(&self, message: PushMessage) -> Result<(), PushError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PushError::NoSubscribers(message.topic));
        }
        self.messages.lock().push(message);
        Ok(())
    }
}

#[async_trait]
impl PushChannel for RecordingPushChannel {
    async fn publish_block(&self, update: BlockUpdate) -> Result<(), PushError> {
        self.record(PushMessage::block(update))
    }

    async fn publish_chain_info(&self, info: Arc<ChainInfo>) -> Result<(), PushError> {
        self.record(PushMessage::chain_info(info))
    }
}

/// Fresh sync context over `node` with a recording push channel.
///
/// # Panics
///
/// Never in practice; the block cache configuration is non-zero.
#[must_use]
pub fn test_context(node: Arc<MockNode>, orphan_window: u64) -> SyncContext {
    test_context_with_push(node, Arc::new(RecordingPushChannel::new()), orphan_window)
}

/// Like [`test_context`], publishing through `push`.
///
/// # Panics
///
/// Never in practice; the block cache configuration is non-zero.
#[must_use]
pub fn test_context_with_push(
    node: Arc<MockNode>,
    push: Arc<dyn PushChannel>,
    orphan_window: u64,
) -> SyncContext {
    let chain_state = Arc::new(ChainTipState::new());
    let block_cache = Arc::new(
        BlockCache::new(&BlockCacheConfig { max_blocks: 1_000 }, Arc::clone(&chain_state))
            .unwrap(),
    );
    SyncContext {
        node,
        chain_state,
        block_cache,
        recent_blocks: Arc::new(RecentBlocksRing::new(100)),
        push,
        metrics: MetricsCollector::new(),
        orphan_window,
    }
}
