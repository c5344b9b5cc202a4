//! Integration Tests for the Explorer Sync Engine
//!
//! This crate contains various test modules:
//!
//! - `sync_scenario_tests`: Tick-by-tick ingestion for both strategies
//! - `reorg_tests`: Reorg detection and repair against caches and the store
//! - `broadcast_tests`: Block updates and coalesced chain info delivery
//! - `node_client_tests`: `NodeClient` against a mocked JSON-RPC node
//! - `runtime_tests`: Runtime builder validation and worker lifecycle
//! - `mock_infrastructure`: Reusable mocks and helpers
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! No external node or database is needed: the node is either `MockNode` or a mockito server,
//! and the persisted store is an in-memory `SQLite` database.

#[cfg(test)]
mod sync_scenario_tests;

#[cfg(test)]
mod reorg_tests;

#[cfg(test)]
mod broadcast_tests;

#[cfg(test)]
mod node_client_tests;

#[cfg(test)]
mod runtime_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
