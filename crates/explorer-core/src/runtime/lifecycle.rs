//! Runtime lifecycle: worker tasks and graceful shutdown.

use crate::{
    chain::BroadcastCoordinator,
    config::AppConfig,
    push::PushMessage,
    reader::ExplorerReader,
    sync::{ChainInfoWorker, ChainSyncOrchestrator, TxStatsWorker},
};
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{builder::ExplorerRuntimeBuilder, ExplorerComponents};

/// Owns the explorer components and their background workers.
///
/// All workers share one [`CancellationToken`]. [`ExplorerRuntime::shutdown`] cancels it and
/// waits for every worker to finish its current step.
pub struct ExplorerRuntime {
    components: ExplorerComponents,
    config: AppConfig,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ExplorerRuntime {
    #[must_use]
    pub fn builder() -> ExplorerRuntimeBuilder {
        ExplorerRuntimeBuilder::new()
    }

    pub(super) fn new(components: ExplorerComponents, config: AppConfig) -> Self {
        Self { components, config, cancel: CancellationToken::new(), tasks: Vec::new() }
    }

    #[must_use]
    pub fn components(&self) -> &ExplorerComponents {
        &self.components
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn reader(&self) -> ExplorerReader {
        self.components.reader()
    }

    /// Subscribes to pushed messages, if the runtime owns its push channel.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Arc<PushMessage>>> {
        self.components.broadcast_channel().map(|channel| channel.subscribe())
    }

    /// Token cancelled on shutdown, for tasks that should stop with the runtime.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty() && !self.cancel.is_cancelled()
    }

    /// Spawns the sync orchestrator, broadcast coordinator, chain info worker and
    /// transaction statistics worker. Calling it again is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            warn!("Explorer runtime already started, ignoring duplicate call");
            return;
        }

        let c = &self.components;
        let explorer = &self.config.explorer;

        let orchestrator = ChainSyncOrchestrator::new(
            Arc::clone(&c.strategy),
            c.metrics,
            explorer.pull_blocks_delay(),
            explorer.startup_retry_delay(),
        );
        let coordinator = BroadcastCoordinator::new(
            Arc::clone(&c.chain_state),
            Arc::clone(&c.push),
            c.metrics,
            explorer.broadcast_delay(),
        );
        let chain_info = ChainInfoWorker::new(
            Arc::clone(&c.node),
            Arc::clone(&c.chain_state),
            c.metrics,
            explorer.pull_blockchain_info_delay(),
        );
        let tx_stats = TxStatsWorker::new(
            Arc::clone(&c.node),
            Arc::clone(&c.chain_state),
            c.metrics,
            explorer.pull_blockchain_stats_delay(),
            explorer.stats_points_count,
            explorer.block_time_seconds,
        );

        self.tasks = vec![
            ("sync", tokio::spawn(orchestrator.run(self.cancel.clone()))),
            ("broadcast", tokio::spawn(coordinator.run(self.cancel.clone()))),
            ("chain_info", tokio::spawn(chain_info.run(self.cancel.clone()))),
            ("tx_stats", tokio::spawn(tx_stats.run(self.cancel.clone()))),
        ];
        info!(mode = explorer.mode.as_str(), workers = self.tasks.len(), "Explorer runtime started");
    }

    /// Cancels every worker and waits for them to exit.
    pub async fn shutdown(self) {
        info!("Initiating explorer runtime shutdown");
        self.cancel.cancel();

        for (name, task) in self.tasks {
            match task.await {
                Ok(()) => debug!(worker = name, "worker stopped"),
                Err(e) if e.is_cancelled() => debug!(worker = name, "worker task cancelled"),
                Err(e) => error!(worker = name, error = %e, "worker task failed"),
            }
        }

        info!("Explorer runtime shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SyncMode, test_utils::MockNode};
    use std::time::Duration;

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.node.username = Some("user".to_string());
        config.node.password = Some("pass".to_string());
        config.explorer.mode = SyncMode::CacheOnly;
        config.explorer.pull_blocks_delay_ms = 5;
        config.explorer.pull_blockchain_info_delay_ms = 5;
        config.explorer.broadcast_delay_ms = 5;
        config.explorer.startup_retry_delay_ms = 5;
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let node = Arc::new(MockNode::with_chain(20));
        let mut runtime = ExplorerRuntime::builder()
            .with_config(fast_config())
            .with_node(Arc::clone(&node) as _)
            .build()
            .await
            .unwrap();
        assert!(!runtime.is_running());

        runtime.start();
        runtime.start();
        assert!(runtime.is_running());

        let reader = runtime.reader();
        tokio::time::timeout(Duration::from_secs(5), async {
            while reader.synced_height() < 20 || reader.chain_info().blocks < 20 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(2), runtime.shutdown()).await.unwrap();
    }
}
