//! Integration tests for push delivery and broadcast coalescing.
//!
//! Block updates are published once per ingested block. Chain info snapshots are published by
//! the broadcast coordinator at most once per cadence, no matter how many blocks arrived.

use crate::mock_infrastructure::{fast_config, runtime_with_node, wait_until};
use explorer_core::{
    chain::{BroadcastCoordinator, ChainTipState},
    config::SyncMode,
    metrics::MetricsCollector,
    push::{PushMessage, PushPayload, Topic},
    test_utils::{MockNode, RecordingPushChannel},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast::error::TryRecvError;

fn coordinator(state: &Arc<ChainTipState>, push: &Arc<RecordingPushChannel>) -> BroadcastCoordinator {
    BroadcastCoordinator::new(
        Arc::clone(state),
        Arc::clone(push) as _,
        MetricsCollector::new(),
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn test_many_pending_marks_coalesce_into_one_broadcast() {
    let state = Arc::new(ChainTipState::new());
    let push = Arc::new(RecordingPushChannel::new());
    let coordinator = coordinator(&state, &push);

    for _ in 0..25 {
        state.mark_pending_broadcast();
    }

    assert!(coordinator.tick().await);
    assert!(!coordinator.tick().await);
    assert_eq!(push.chain_info_count(), 1);
}

#[tokio::test]
async fn test_failed_broadcast_clears_flag() {
    let state = Arc::new(ChainTipState::new());
    let push = Arc::new(RecordingPushChannel::new());
    push.set_failing(true);
    let coordinator = coordinator(&state, &push);

    state.mark_pending_broadcast();
    assert!(coordinator.tick().await);
    assert!(!state.take_and_clear_pending_broadcast());
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<Arc<PushMessage>>) -> Vec<Arc<PushMessage>> {
    let mut messages = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(message) => messages.push(message),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return messages,
        }
    }
}

#[tokio::test]
async fn test_runtime_pushes_block_updates_and_coalesced_chain_info() {
    let node = Arc::new(MockNode::with_chain(20));
    let mut config = fast_config(SyncMode::CacheOnly);
    config.explorer.broadcast_delay_ms = 200;
    let mut runtime = runtime_with_node(config, &node).await;
    let mut receiver = runtime.subscribe().expect("in-process push channel");
    let reader = runtime.reader();

    runtime.start();
    wait_until(Duration::from_secs(5), || reader.synced_height() == 20).await;

    node.extend(5);
    wait_until(Duration::from_secs(5), || reader.synced_height() == 25).await;
    tokio::time::sleep(Duration::from_millis(450)).await;
    runtime.shutdown().await;

    let messages = drain(&mut receiver);
    let heights: Vec<u64> = messages
        .iter()
        .filter_map(|message| match &message.payload {
            PushPayload::Block(update) => Some(update.height),
            PushPayload::ChainInfo(_) => None,
        })
        .collect();
    assert_eq!(heights, vec![21, 22, 23, 24, 25]);

    let chain_info: Vec<_> =
        messages.iter().filter(|message| message.topic == Topic::BackgroundData).collect();
    assert!(!chain_info.is_empty());
    assert!(chain_info.len() < heights.len());
    assert!(chain_info.iter().all(|message| message.event == "blockchainInfoUpdated"));
}
