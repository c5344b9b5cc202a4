//! Builder for the explorer runtime.

use crate::{
    cache::{BlockCache, BlockCacheConfig, BlockCacheError, RecentBlocksRing},
    chain::ChainTipState,
    config::{AppConfig, SyncMode},
    metrics::MetricsCollector,
    push::{BroadcastPushChannel, PushChannel},
    store::{BlockStore, SqliteBlockStore, StoreError},
    sync::{CacheOnlyStrategy, IngestionStrategy, PersistedStrategy, SyncContext},
    upstream::{NodeClient, NodeRpc, UpstreamError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::{lifecycle::ExplorerRuntime, ExplorerComponents};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("Node client initialization failed: {0}")]
    Node(#[from] UpstreamError),

    #[error("Store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("Block cache initialization failed: {0}")]
    Cache(#[from] BlockCacheError),
}

/// Builder for [`ExplorerRuntime`].
///
/// The node, store and push channel can be injected; anything not injected is built from
/// the configuration.
#[derive(Default)]
pub struct ExplorerRuntimeBuilder {
    config: Option<AppConfig>,
    node: Option<Arc<dyn NodeRpc>>,
    store: Option<Arc<dyn BlockStore>>,
    push: Option<Arc<dyn PushChannel>>,
}

impl ExplorerRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `node` instead of a JSON-RPC client built from `config.node`.
    #[must_use]
    pub fn with_node(mut self, node: Arc<dyn NodeRpc>) -> Self {
        self.node = Some(node);
        self
    }

    /// Uses `store` instead of connecting to `config.store.database_url`.
    ///
    /// Ignored in cache-only mode.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn BlockStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Publishes through `push` instead of an in-process broadcast channel.
    #[must_use]
    pub fn with_push_channel(mut self, push: Arc<dyn PushChannel>) -> Self {
        self.push = Some(push);
        self
    }

    /// Validates the configuration and initializes every component. Workers are not started.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError` if the configuration is missing or invalid, or if the node
    /// client, store or block cache cannot be initialized.
    pub async fn build(self) -> Result<ExplorerRuntime, RuntimeError> {
        let config = self.config.ok_or_else(|| {
            RuntimeError::ConfigValidation("No configuration provided".to_string())
        })?;
        config.validate().map_err(RuntimeError::ConfigValidation)?;

        let explorer = &config.explorer;
        info!(
            mode = explorer.mode.as_str(),
            node = %config.node.url,
            batch = explorer.effective_batch_size(),
            orphan_window = explorer.effective_orphan_window(),
            "Initializing explorer runtime"
        );

        let chain_state = Arc::new(ChainTipState::new());
        let block_cache = Arc::new(BlockCache::new(
            &BlockCacheConfig { max_blocks: explorer.block_cache_max_blocks },
            Arc::clone(&chain_state),
        )?);
        let recent_blocks = Arc::new(RecentBlocksRing::new(explorer.recent_blocks_capacity));
        debug!("Chain state and caches initialized");

        let node: Arc<dyn NodeRpc> = match self.node {
            Some(node) => node,
            None => Arc::new(NodeClient::new(&config.node)?),
        };

        let (push, broadcast_channel) = match self.push {
            Some(push) => (push, None),
            None => {
                let channel = BroadcastPushChannel::new(explorer.push_channel_capacity);
                (Arc::new(channel.clone()) as Arc<dyn PushChannel>, Some(channel))
            }
        };

        let metrics = MetricsCollector::new();
        let ctx = SyncContext {
            node: Arc::clone(&node),
            chain_state: Arc::clone(&chain_state),
            block_cache: Arc::clone(&block_cache),
            recent_blocks: Arc::clone(&recent_blocks),
            push: Arc::clone(&push),
            metrics,
            orphan_window: explorer.effective_orphan_window(),
        };

        let store = match (explorer.mode, self.store) {
            (SyncMode::CacheOnly, _) => None,
            (SyncMode::Persisted, Some(store)) => Some(store),
            (SyncMode::Persisted, None) => Some(Self::connect_store(&config).await?),
        };
        let strategy: Arc<dyn IngestionStrategy> = match &store {
            None => Arc::new(CacheOnlyStrategy::new(ctx)),
            Some(store) => Arc::new(PersistedStrategy::new(
                ctx,
                Arc::clone(store),
                explorer.effective_batch_size(),
                config.store.store_raw_transactions,
            )),
        };
        debug!(mode = explorer.mode.as_str(), "Ingestion strategy selected");

        let components = ExplorerComponents {
            chain_state,
            block_cache,
            recent_blocks,
            node,
            store,
            push,
            broadcast_channel,
            strategy,
            metrics,
        };

        info!("Explorer runtime initialization complete");
        Ok(ExplorerRuntime::new(components, config))
    }

    async fn connect_store(config: &AppConfig) -> Result<Arc<dyn BlockStore>, RuntimeError> {
        let url = config.store.database_url.as_deref().ok_or_else(|| {
            RuntimeError::ConfigValidation("Persisted mode requires store.database_url".to_string())
        })?;
        let store = SqliteBlockStore::connect(url).await?;
        store.migrate().await?;
        info!("Block store connected and migrated");
        Ok(Arc::new(store))
    }
}
