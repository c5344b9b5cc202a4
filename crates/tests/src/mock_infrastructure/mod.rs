//! Mock Infrastructure for Testing the Explorer Sync Engine
//!
//! Reusable mocks for exercising the engine without a real node.
//!
//! ## Components
//!
//! - `NodeRpcMockBuilder`: Wraps mockito to mock the node's JSON-RPC methods over HTTP
//! - `BlockResponseBuilder`: Builds `getblock` results
//! - Test helpers for configurations and runtimes
//!
//! In-memory fakes (`MockNode`, `RecordingPushChannel`) live in `explorer_core::test_utils`.
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{BlockResponseBuilder, NodeRpcMockBuilder};
//!
//! let mut mock = NodeRpcMockBuilder::new().await;
//! let block = BlockResponseBuilder::new(100).build();
//! mock.mock_block_hash(100, block["hash"].as_str().unwrap());
//! ```

pub mod rpc_mock;
pub mod test_helpers;

pub use rpc_mock::{BlockResponseBuilder, NodeRpcMockBuilder};
pub use test_helpers::*;
