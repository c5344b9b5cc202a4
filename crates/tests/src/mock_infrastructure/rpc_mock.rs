//! RPC Mock Builder for bitcoin-style node JSON-RPC testing
//!
//! Wraps mockito to provide response builders for the methods the sync engine calls.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Builder for mock node RPC responses.
pub struct NodeRpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl NodeRpcMockBuilder {
    /// Creates a new builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    fn mock_result(&mut self, matcher: Value, result: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(matcher))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"result": result, "error": null, "id": 1}).to_string())
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks `getblockcount`.
    pub fn mock_block_count(&mut self, height: u64) -> &mut Self {
        self.mock_result(json!({"method": "getblockcount"}), &json!(height))
    }

    /// Mocks `getblockhash` for one height.
    pub fn mock_block_hash(&mut self, height: u64, hash: &str) -> &mut Self {
        self.mock_result(json!({"method": "getblockhash", "params": [height]}), &json!(hash))
    }

    /// Mocks `getblock` for one hash at one verbosity.
    pub fn mock_block(&mut self, hash: &str, verbosity: u8, block: &Value) -> &mut Self {
        self.mock_result(json!({"method": "getblock", "params": [hash, verbosity]}), block)
    }

    /// Mocks `getblockchaininfo`.
    pub fn mock_chain_info(&mut self, info: &Value) -> &mut Self {
        self.mock_result(json!({"method": "getblockchaininfo"}), info)
    }

    /// Mocks the node's "Block height out of range" error for `getblockhash` at `height`.
    pub fn mock_height_out_of_range(&mut self, height: u64) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(
                json!({"method": "getblockhash", "params": [height]}),
            ))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "result": null,
                    "error": {"code": -8, "message": "Block height out of range"},
                    "id": 1
                })
                .to_string(),
            )
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks a failure for every request.
    pub fn mock_error(&mut self, status: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(status)
            .with_body("Internal Server Error")
            .create();

        self.mocks.push(mock);
        self
    }
}

/// Builder for `getblock` results.
pub struct BlockResponseBuilder {
    height: u64,
    hash: String,
    previous_hash: Option<String>,
    proof_type: String,
    txids: Vec<String>,
}

impl BlockResponseBuilder {
    #[must_use]
    pub fn new(height: u64) -> Self {
        Self {
            height,
            hash: format!("{height:064x}"),
            previous_hash: height.checked_sub(1).map(|parent| format!("{parent:064x}")),
            proof_type: "Proof-of-Stake".to_string(),
            txids: vec![format!("{:064x}", height * 1_000)],
        }
    }

    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    #[must_use]
    pub fn with_proof_type(mut self, proof_type: impl Into<String>) -> Self {
        self.proof_type = proof_type.into();
        self
    }

    #[must_use]
    pub fn with_txids(mut self, txids: Vec<String>) -> Self {
        self.txids = txids;
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        json!({
            "hash": self.hash,
            "height": self.height,
            "size": 250,
            "weight": 1000,
            "proof_type": self.proof_type,
            "time": 1_600_000_000 + self.height * 120,
            "mediantime": 1_600_000_000 + self.height * 120 - 600,
            "nTx": self.txids.len(),
            "previousblockhash": self.previous_hash,
            "tx": self.txids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_response_builder() {
        let block = BlockResponseBuilder::new(100).build();
        assert_eq!(block["height"], 100);
        assert_eq!(block["nTx"], 1);
        assert_eq!(block["hash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_genesis_has_no_parent() {
        let block = BlockResponseBuilder::new(0).build();
        assert!(block["previousblockhash"].is_null());
    }
}
