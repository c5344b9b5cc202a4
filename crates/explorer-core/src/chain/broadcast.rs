use crate::{chain::ChainTipState, metrics::MetricsCollector, push::PushChannel};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically drains the pending-broadcast flag and pushes the chain info snapshot.
///
/// Decouples per-block ingestion from client notification: any number of ingested blocks
/// between two cadences produce a single `blockchainInfoUpdated` message.
pub struct BroadcastCoordinator {
    chain_state: Arc<ChainTipState>,
    push: Arc<dyn PushChannel>,
    metrics: MetricsCollector,
    delay: Duration,
}

impl BroadcastCoordinator {
    #[must_use]
    pub fn new(
        chain_state: Arc<ChainTipState>,
        push: Arc<dyn PushChannel>,
        metrics: MetricsCollector,
        delay: Duration,
    ) -> Self {
        Self { chain_state, push, metrics, delay }
    }

    /// Runs one cadence step.
    ///
    /// # Returns
    ///
    /// `true` if the flag was set and a broadcast was attempted.
    pub async fn tick(&self) -> bool {
        if !self.chain_state.take_and_clear_pending_broadcast() {
            return false;
        }

        let info = self.chain_state.chain_info();
        match self.push.publish_chain_info(info).await {
            Ok(()) => self.metrics.record_broadcast(),
            Err(e) => debug!(error = %e, "chain info broadcast dropped"),
        }
        true
    }

    /// Runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(delay_ms = self.delay.as_millis(), "broadcast coordinator started");
        loop {
            self.tick().await;

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.delay) => {}
            }
        }
        info!("broadcast coordinator shutting down");
    }
}
