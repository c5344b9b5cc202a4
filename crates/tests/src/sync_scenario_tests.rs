//! Integration tests for the ingestion strategies driven tick by tick.
//!
//! These tests exercise both strategies against an in-memory node and (for persisted mode) an
//! in-memory `SQLite` store, verifying:
//! - Batch boundaries and gap-free progress
//! - Resuming from the store after a restart
//! - Idempotent re-ingestion of partially stored heights
//! - Cache-only tip following and the published update stream

use explorer_core::{
    store::{BlockRow, BlockStore, SqliteBlockStore},
    sync::{CacheOnlyStrategy, IngestionStrategy, PersistedStrategy},
    test_utils::{test_context, test_context_with_push, MockNode, RecordingPushChannel},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn migrated_store() -> Arc<SqliteBlockStore> {
    let store = SqliteBlockStore::in_memory().await.expect("in-memory store");
    store.migrate().await.expect("schema");
    Arc::new(store)
}

fn persisted(node: &Arc<MockNode>, store: &Arc<SqliteBlockStore>) -> PersistedStrategy {
    PersistedStrategy::new(
        test_context(Arc::clone(node), 5),
        Arc::clone(store) as Arc<dyn BlockStore>,
        10,
        false,
    )
}

#[tokio::test]
async fn test_first_persisted_tick_ingests_one_batch() {
    let node = Arc::new(MockNode::with_chain(100));
    let store = migrated_store().await;
    let strategy = persisted(&node, &store);
    let cancel = CancellationToken::new();

    assert_eq!(strategy.initialize(&cancel).await.unwrap(), 0);
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert_eq!(outcome.ingested, (1..=10).collect::<Vec<_>>());
    assert!(outcome.repaired.is_empty());
    assert_eq!(store.synced_heights().await.unwrap(), (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_persisted_progress_is_gap_free() {
    let node = Arc::new(MockNode::with_chain(35));
    let store = migrated_store().await;
    let strategy = persisted(&node, &store);
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();

    let mut ingested = Vec::new();
    for _ in 0..6 {
        ingested.extend(strategy.tick(&cancel).await.unwrap().ingested);
    }

    assert_eq!(ingested, (1..=35).collect::<Vec<_>>());
    assert_eq!(store.synced_heights().await.unwrap(), (1..=35).collect::<Vec<_>>());

    let latest = store.get_latest_block(true).await.unwrap().unwrap();
    assert_eq!(latest.height, 35);
    assert_eq!(latest.hash, node.block_at(35).unwrap().hash());
}

#[tokio::test]
async fn test_persisted_restart_resumes_after_last_synced_block() {
    let node = Arc::new(MockNode::with_chain(100));
    let store = migrated_store().await;
    let cancel = CancellationToken::new();

    let first = persisted(&node, &store);
    first.initialize(&cancel).await.unwrap();
    first.tick(&cancel).await.unwrap();
    drop(first);

    let restarted = persisted(&node, &store);
    assert_eq!(restarted.initialize(&cancel).await.unwrap(), 10);
    let outcome = restarted.tick(&cancel).await.unwrap();

    assert_eq!(outcome.ingested, (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_persisted_reingest_of_unsynced_row_is_idempotent() {
    let node = Arc::new(MockNode::with_chain(3));
    let store = migrated_store().await;

    // A crash left height 1 stored with half its transactions and never marked synced.
    let block = node.block_at(1).unwrap();
    store.insert_block(&BlockRow::from_block(&block)).await.unwrap();
    store.insert_transactions(1, &block.txids()[..1]).await.unwrap();

    let strategy = persisted(&node, &store);
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert_eq!(outcome.ingested, vec![1, 2, 3]);
    assert_eq!(store.transaction_count(1).await.unwrap(), block.txids().len() as u64);
    assert_eq!(store.synced_heights().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_persisted_idle_when_store_is_at_node_tip() {
    let node = Arc::new(MockNode::with_chain(4));
    let store = migrated_store().await;
    let strategy = persisted(&node, &store);
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();
    strategy.tick(&cancel).await.unwrap();

    let outcome = strategy.tick(&cancel).await.unwrap();
    assert!(outcome.is_idle());

    node.extend(2);
    assert_eq!(strategy.tick(&cancel).await.unwrap().ingested, vec![5, 6]);
}

#[tokio::test]
async fn test_persisted_stores_raw_transactions_when_enabled() {
    let node = Arc::new(MockNode::with_chain(2));
    let store = migrated_store().await;
    let strategy = PersistedStrategy::new(
        test_context(Arc::clone(&node), 5),
        Arc::clone(&store) as Arc<dyn BlockStore>,
        10,
        true,
    );
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();
    strategy.tick(&cancel).await.unwrap();

    for height in 1..=2 {
        for tx in &node.block_at(height).unwrap().txids() {
            let hex = store.get_raw_tx(tx).await.unwrap().expect("raw tx stored");
            assert!(hex.starts_with("02000000"));
        }
    }
}

#[tokio::test]
async fn test_cache_only_follows_tip_and_publishes_in_order() {
    let node = Arc::new(MockNode::with_chain(50));
    let push = Arc::new(RecordingPushChannel::new());
    let ctx = test_context_with_push(Arc::clone(&node), push.clone(), 5);
    let strategy = CacheOnlyStrategy::new(ctx.clone());
    let cancel = CancellationToken::new();

    assert_eq!(strategy.initialize(&cancel).await.unwrap(), 50);

    node.extend(3);
    for _ in 0..5 {
        strategy.tick(&cancel).await.unwrap();
    }

    assert_eq!(ctx.chain_state.synced_height(), 53);
    assert_eq!(push.block_heights(), vec![51, 52, 53]);
    assert_eq!(ctx.chain_state.latest_summary().unwrap().height, 53);
    assert_eq!(ctx.recent_blocks.head().unwrap().height, 53);
    for height in 50..=53 {
        assert!(ctx.block_cache.validate(height, node.block_at(height).unwrap().hash()));
    }
}

#[tokio::test]
async fn test_cache_only_push_failure_does_not_block_ingestion() {
    let node = Arc::new(MockNode::with_chain(10));
    let push = Arc::new(RecordingPushChannel::new());
    push.set_failing(true);
    let ctx = test_context_with_push(Arc::clone(&node), push.clone(), 5);
    let strategy = CacheOnlyStrategy::new(ctx.clone());
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();

    node.extend(1);
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert_eq!(outcome.ingested, vec![11]);
    assert!(push.messages().is_empty());
    assert!(ctx.block_cache.get(11).is_some());
    assert!(ctx.chain_state.take_and_clear_pending_broadcast());
}
