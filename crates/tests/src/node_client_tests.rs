//! Integration tests for `NodeClient` against a mocked JSON-RPC node.
//!
//! The node is served by mockito over HTTP, so these tests cover request encoding, basic auth,
//! error-code mapping and block decoding end to end.

use crate::mock_infrastructure::{chain_info_json, BlockResponseBuilder, NodeRpcMockBuilder};
use explorer_core::{
    cache::{BlockTransaction, ProofType},
    config::NodeConfig,
    upstream::{BlockVerbosity, NodeClient, NodeRpc, UpstreamError},
};

fn client(url: String) -> NodeClient {
    NodeClient::new(&NodeConfig {
        url,
        username: Some("rpcuser".to_string()),
        password: Some("rpcpassword".to_string()),
        timeout_seconds: 5,
        concurrency_limit: 4,
    })
    .expect("client builds")
}

#[tokio::test]
async fn test_best_height_and_hash_lookup() {
    let mut mock = NodeRpcMockBuilder::new().await;
    let block = BlockResponseBuilder::new(120).build();
    let hash = block["hash"].as_str().unwrap().to_string();
    mock.mock_block_count(120).mock_block_hash(120, &hash);

    let node = client(mock.url());

    assert_eq!(node.get_best_height().await.unwrap(), 120);
    assert_eq!(node.get_block_hash(120).await.unwrap(), Some(hash));
}

#[tokio::test]
async fn test_height_beyond_tip_is_none() {
    let mut mock = NodeRpcMockBuilder::new().await;
    mock.mock_height_out_of_range(121);

    let node = client(mock.url());

    assert_eq!(node.get_block_hash(121).await.unwrap(), None);
}

#[tokio::test]
async fn test_block_decodes_summary_and_txids() {
    let mut mock = NodeRpcMockBuilder::new().await;
    let txids = vec!["aa".repeat(32), "bb".repeat(32)];
    let block = BlockResponseBuilder::new(7)
        .with_hash("AB".repeat(32))
        .with_proof_type("Proof-of-Work (ProgPow)")
        .with_txids(txids.clone())
        .build();
    mock.mock_block(&"AB".repeat(32), 1, &block);

    let node = client(mock.url());
    let full = node.get_block(&"AB".repeat(32), BlockVerbosity::TxIds).await.unwrap().unwrap();

    assert_eq!(full.height(), 7);
    assert_eq!(full.hash(), "ab".repeat(32));
    assert_eq!(full.summary.proof_type, ProofType::ProofOfWorkProgPow);
    assert_eq!(full.summary.tx_count, 2);
    assert_eq!(full.previous_hash.as_deref(), Some(format!("{:064x}", 6).as_str()));
    assert_eq!(full.txids(), txids);
    assert!(full.transactions.iter().all(|tx| matches!(tx, BlockTransaction::Id(_))));
}

#[tokio::test]
async fn test_chain_info_keeps_unreported_fields() {
    let mut mock = NodeRpcMockBuilder::new().await;
    mock.mock_chain_info(&chain_info_json(50_000));

    let node = client(mock.url());
    let info = node.get_chain_info().await.unwrap();

    assert_eq!(info.blocks, 50_000);
    assert_eq!(info.chain, "main");
    assert!(info.extra.contains_key("moneysupply"));
}

#[tokio::test]
async fn test_http_failure_surfaces_as_error() {
    let mut mock = NodeRpcMockBuilder::new().await;
    mock.mock_error(503);

    let node = client(mock.url());
    let result = node.get_best_height().await;

    assert!(matches!(result, Err(UpstreamError::HttpError(503, _))));
}
