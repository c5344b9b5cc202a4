//! Test Helper Functions and Utilities
//!
//! Common helpers for building configurations and runtimes in tests.

use explorer_core::{
    config::{AppConfig, SyncMode},
    runtime::ExplorerRuntime,
    test_utils::MockNode,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

/// Valid configuration with millisecond cadences, suitable for driving workers in tests.
#[must_use]
pub fn fast_config(mode: SyncMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.node.username = Some("rpcuser".to_string());
    config.node.password = Some("rpcpassword".to_string());
    config.explorer.mode = mode;
    config.explorer.blocks_per_batch = 10;
    config.explorer.blocks_orphan_check = 5;
    config.explorer.pull_blocks_delay_ms = 5;
    config.explorer.pull_blockchain_info_delay_ms = 5;
    config.explorer.pull_blockchain_stats_delay_ms = 60_000;
    config.explorer.broadcast_delay_ms = 20;
    config.explorer.startup_retry_delay_ms = 10;
    if mode == SyncMode::Persisted {
        config.store.database_url = Some("sqlite::memory:".to_string());
    }
    config
}

/// Builds a runtime over `node` without starting it.
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub async fn runtime_with_node(config: AppConfig, node: &Arc<MockNode>) -> ExplorerRuntime {
    ExplorerRuntime::builder()
        .with_config(config)
        .with_node(Arc::clone(node) as _)
        .build()
        .await
        .expect("runtime builds")
}

/// Polls `condition` every 5ms until it holds.
///
/// # Panics
///
/// Panics if `condition` still fails after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Minimal `getblockchaininfo` result.
#[must_use]
pub fn chain_info_json(blocks: u64) -> Value {
    json!({
        "chain": "main",
        "blocks": blocks,
        "headers": blocks,
        "bestblockhash": format!("{blocks:064x}"),
        "difficulty": 1.5,
        "mediantime": 1_600_000_000,
        "verificationprogress": 1.0,
        "chainwork": "00",
        "pruned": false,
        "moneysupply": 1_000_000
    })
}
