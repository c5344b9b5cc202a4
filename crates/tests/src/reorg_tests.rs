//! Integration tests for reorg detection and repair.
//!
//! A reorg is simulated by replacing the node's block at one height. The next tick's
//! trailing window must notice the hash mismatch and overwrite the stale record.

use explorer_core::{
    reader::ExplorerReader,
    store::{BlockStore, SqliteBlockStore},
    sync::{CacheOnlyStrategy, IngestionStrategy, PersistedStrategy},
    test_utils::{test_context, MockNode},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn reader_for(ctx: &explorer_core::sync::SyncContext) -> ExplorerReader {
    ExplorerReader::new(
        Arc::clone(&ctx.chain_state),
        Arc::clone(&ctx.block_cache),
        Arc::clone(&ctx.recent_blocks),
    )
}

#[tokio::test]
async fn test_cache_reorg_inside_window_is_repaired() {
    let node = Arc::new(MockNode::with_chain(45));
    let ctx = test_context(Arc::clone(&node), 5);
    let strategy = CacheOnlyStrategy::new(ctx.clone());
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();

    node.extend(5);
    for _ in 0..5 {
        strategy.tick(&cancel).await.unwrap();
    }
    let stale = reader_for(&ctx).full_block_by_height(48).unwrap();

    node.reorg_at(48);
    node.extend(1);
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert_eq!(outcome.ingested, vec![51]);
    assert_eq!(outcome.repaired, vec![48]);

    let canonical = node.block_at(48).unwrap();
    let reader = reader_for(&ctx);
    assert_ne!(stale.hash(), canonical.hash());
    assert_eq!(reader.full_block_by_height(48).unwrap().hash(), canonical.hash());
    assert_eq!(reader.summary_by_height(48).unwrap().hash, canonical.hash());
}

#[tokio::test]
async fn test_cache_reorg_outside_window_is_ignored() {
    let node = Arc::new(MockNode::with_chain(40));
    let ctx = test_context(Arc::clone(&node), 3);
    let strategy = CacheOnlyStrategy::new(ctx.clone());
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();

    node.extend(10);
    for _ in 0..10 {
        strategy.tick(&cancel).await.unwrap();
    }

    node.reorg_at(41);
    node.extend(1);
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert!(outcome.repaired.is_empty());
    assert_ne!(ctx.block_cache.get(41).unwrap().hash, node.block_at(41).unwrap().hash());
}

#[tokio::test]
async fn test_cache_reorg_at_tip_refreshes_latest_summary() {
    let node = Arc::new(MockNode::with_chain(30));
    let ctx = test_context(Arc::clone(&node), 5);
    let strategy = CacheOnlyStrategy::new(ctx.clone());
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();

    node.reorg_at(30);
    let outcome = strategy.tick(&cancel).await.unwrap();

    // Nothing new at 31, so the tick is idle and the reorg waits for the next block.
    assert!(outcome.is_idle());

    node.extend(1);
    let outcome = strategy.tick(&cancel).await.unwrap();
    assert_eq!(outcome.repaired, vec![30]);
    assert_eq!(ctx.recent_blocks.get(30).unwrap().hash, node.block_at(30).unwrap().hash());
}

#[tokio::test]
async fn test_persisted_reorg_repairs_stored_row_and_transactions() {
    let node = Arc::new(MockNode::with_chain(20));
    let store = SqliteBlockStore::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    let store = Arc::new(store);

    let strategy = PersistedStrategy::new(
        test_context(Arc::clone(&node), 5),
        Arc::clone(&store) as Arc<dyn BlockStore>,
        10,
        false,
    );
    let cancel = CancellationToken::new();
    strategy.initialize(&cancel).await.unwrap();
    strategy.tick(&cancel).await.unwrap();
    strategy.tick(&cancel).await.unwrap();

    node.reorg_at(18);
    let outcome = strategy.tick(&cancel).await.unwrap();

    assert!(outcome.ingested.is_empty());
    assert_eq!(outcome.repaired, vec![18]);

    let canonical = node.block_at(18).unwrap();
    let row = store.get_block(18).await.unwrap().unwrap();
    assert_eq!(row.hash, canonical.hash());
    assert!(row.synced);
    assert_eq!(store.transaction_count(18).await.unwrap(), canonical.txids().len() as u64);

    let again = strategy.tick(&cancel).await.unwrap();
    assert!(again.repaired.is_empty());
}
