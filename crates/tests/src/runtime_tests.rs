//! Integration tests for the explorer runtime lifecycle and builder.
//!
//! These tests verify:
//! - Builder validation catches configuration errors before anything is started
//! - Workers start, make progress and stop on shutdown
//! - Persisted mode writes through to an injected store
//! - Duplicate start calls are ignored
//!
//! Tests use `tokio::time::timeout` so a stuck worker fails instead of hanging.

use crate::mock_infrastructure::{fast_config, runtime_with_node, wait_until};
use explorer_core::{
    config::SyncMode,
    runtime::{ExplorerRuntime, RuntimeError},
    store::{BlockStore, SqliteBlockStore},
    test_utils::MockNode,
};
use serial_test::serial;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let mut config = fast_config(SyncMode::CacheOnly);
    config.node.password = None;

    let result = ExplorerRuntime::builder().with_config(config).build().await;

    match result {
        Err(RuntimeError::ConfigValidation(message)) => assert!(message.contains("password")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("runtime built without credentials"),
    }
}

#[tokio::test]
async fn test_persisted_mode_requires_database_url() {
    let mut config = fast_config(SyncMode::Persisted);
    config.store.database_url = None;

    let result = ExplorerRuntime::builder().with_config(config).build().await;

    assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
}

#[tokio::test]
async fn test_invalid_node_url_rejected() {
    let mut config = fast_config(SyncMode::CacheOnly);
    config.node.url = "ftp://node".to_string();

    let result = ExplorerRuntime::builder().with_config(config).build().await;

    assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
}

#[tokio::test]
async fn test_cache_only_runtime_follows_node_and_shuts_down() {
    let node = Arc::new(MockNode::with_chain(30));
    let mut runtime = runtime_with_node(fast_config(SyncMode::CacheOnly), &node).await;
    let reader = runtime.reader();

    assert!(!runtime.is_running());
    runtime.start();
    assert!(runtime.is_running());

    wait_until(Duration::from_secs(5), || reader.synced_height() == 30).await;
    node.extend(3);
    wait_until(Duration::from_secs(5), || reader.synced_height() == 33).await;
    wait_until(Duration::from_secs(5), || reader.chain_info().blocks == 33).await;

    let latest: Vec<u64> = reader.latest_summaries(4).iter().map(|s| s.height).collect();
    assert_eq!(latest, vec![33, 32, 31, 30]);

    timeout(Duration::from_secs(5), runtime.shutdown()).await.expect("shutdown completes");
}

#[tokio::test]
async fn test_cache_only_runtime_waits_for_reachable_node() {
    let node = Arc::new(MockNode::with_chain(12));
    node.set_failing(true);
    let mut runtime = runtime_with_node(fast_config(SyncMode::CacheOnly), &node).await;
    let reader = runtime.reader();
    runtime.start();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reader.latest_summary().is_none());

    node.set_failing(false);
    wait_until(Duration::from_secs(5), || reader.synced_height() == 12).await;

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_persisted_runtime_writes_through_to_store() {
    let node = Arc::new(MockNode::with_chain(25));
    let store = SqliteBlockStore::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    let store = Arc::new(store);

    let mut runtime = ExplorerRuntime::builder()
        .with_config(fast_config(SyncMode::Persisted))
        .with_node(Arc::clone(&node) as _)
        .with_store(Arc::clone(&store) as Arc<dyn BlockStore>)
        .build()
        .await
        .unwrap();
    assert!(runtime.components().store().is_some());

    let reader = runtime.reader();
    runtime.start();
    wait_until(Duration::from_secs(5), || reader.synced_height() == 25).await;
    runtime.shutdown().await;

    assert_eq!(store.synced_heights().await.unwrap(), (1..=25).collect::<Vec<_>>());
    let latest = store.get_latest_block(true).await.unwrap().unwrap();
    assert_eq!(latest.hash, node.block_at(25).unwrap().hash());
}

#[tokio::test]
async fn test_duplicate_start_is_ignored() {
    let node = Arc::new(MockNode::with_chain(5));
    let mut runtime = runtime_with_node(fast_config(SyncMode::CacheOnly), &node).await;
    let cancel = runtime.cancellation_token();

    runtime.start();
    runtime.start();

    timeout(Duration::from_secs(5), runtime.shutdown()).await.expect("shutdown completes");
    assert!(cancel.is_cancelled());
}

#[tokio::test]
#[serial]
async fn test_config_file_and_environment_overrides() {
    let path = std::env::temp_dir().join("explorer-runtime-test.toml");
    std::fs::write(
        &path,
        r#"
[node]
url = "http://10.0.0.2:58812"
username = "rpcuser"
password = "rpcpassword"

[explorer]
mode = "persisted"
blocks_per_batch = 0

[store]
database_url = "sqlite::memory:"
"#,
    )
    .unwrap();
    std::env::set_var("EXPLORER__EXPLORER__BLOCKS_ORPHAN_CHECK", "7");

    let config = explorer_core::config::AppConfig::from_file(&path);
    std::env::remove_var("EXPLORER__EXPLORER__BLOCKS_ORPHAN_CHECK");
    std::fs::remove_file(&path).ok();
    let config = config.unwrap();

    assert_eq!(config.explorer.mode, SyncMode::Persisted);
    assert_eq!(config.explorer.effective_batch_size(), 10);
    assert_eq!(config.explorer.effective_orphan_window(), 7);
    assert!(config.validate().is_ok());
}
