use crate::{
    chain::ChainTipState,
    metrics::MetricsCollector,
    sync::{cancellable, SyncError},
    upstream::NodeRpc,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polls `getblockchaininfo` and publishes the snapshot into [`ChainTipState`].
///
/// The derived next superblock height and the node height are computed on every refresh.
/// Broadcasting is left to the broadcast coordinator.
pub struct ChainInfoWorker {
    node: Arc<dyn NodeRpc>,
    chain_state: Arc<ChainTipState>,
    metrics: MetricsCollector,
    delay: Duration,
}

impl ChainInfoWorker {
    #[must_use]
    pub fn new(
        node: Arc<dyn NodeRpc>,
        chain_state: Arc<ChainTipState>,
        metrics: MetricsCollector,
        delay: Duration,
    ) -> Self {
        Self { node, chain_state, metrics, delay }
    }

    /// Fetches one snapshot.
    ///
    /// # Errors
    ///
    /// Returns the upstream error, or [`SyncError::Cancelled`].
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<u64, SyncError> {
        let info = cancellable(cancel, self.node.get_chain_info()).await?;
        let blocks = info.blocks;
        self.chain_state.update_chain_info(info);
        self.metrics.record_node_height(self.chain_state.node_height());
        Ok(blocks)
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(delay_ms = self.delay.as_millis(), "chain info worker started");

        while !cancel.is_cancelled() {
            match self.refresh(&cancel).await {
                Ok(blocks) => debug!(blocks = blocks, "chain info refreshed"),
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    warn!(error = %e, "chain info refresh failed");
                    self.metrics.record_tick_failure("chain_info");
                }
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.delay) => {}
            }
        }
        info!("chain info worker shutting down");
    }
}
