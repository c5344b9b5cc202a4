//! # Explorer Core
//!
//! Chain synchronization engine for the block explorer backend.
//!
//! This crate keeps a near-real-time mirror of a bitcoin-style node and exposes it to an
//! API layer:
//!
//! - **[`sync`]**: Ingestion orchestrator with cache-only and persisted strategies, trailing
//!   window reorg repair, and the chain info and transaction statistics workers.
//!
//! - **[`cache`]**: Height-keyed block cache and the fixed-capacity ring of recent block
//!   summaries.
//!
//! - **[`chain`]**: Shared chain tip state and the coalescing broadcast coordinator.
//!
//! - **[`upstream`]**: JSON-RPC node client with basic auth and bounded concurrency.
//!
//! - **[`store`]**: Relational block store (`SQLite`) used in persisted mode.
//!
//! - **[`push`]**: Topic-based push channel for `blocksUpdated` and `blockchainInfoUpdated`.
//!
//! - **[`reader`]**: Pure read surface over the in-memory state.
//!
//! - **[`runtime`]**: Component wiring, worker tasks and graceful shutdown.
//!
//! ## Data Flow
//!
//! ```text
//!         ┌──────────────┐
//!         │     Node     │
//!         └──────┬───────┘
//!                │ getblockhash / getblock
//!                ▼
//!   ┌────────────────────────┐      ┌──────────────┐
//!   │ ChainSyncOrchestrator  │─────►│  BlockStore  │ (persisted mode)
//!   └───────────┬────────────┘      └──────────────┘
//!               │
//!     ┌─────────┼─────────────────┬──────────────────┐
//!     ▼         ▼                 ▼                  ▼
//! BlockCache  RecentBlocksRing  ChainTipState    PushChannel
//!     │         │                 │  pending flag    "blocks"
//!     └─────────┴───────┬─────────┘       │
//!                       ▼                 ▼
//!                ExplorerReader   BroadcastCoordinator ──► "background_data"
//! ```
//!
//! ## Feature Flags
//!
//! - `test-utils`: In-memory `MockNode` and `RecordingPushChannel` for integration tests

pub mod cache;
pub mod chain;
pub mod config;
pub mod metrics;
pub mod push;
pub mod reader;
pub mod runtime;
pub mod store;
pub mod sync;
pub mod types;
pub mod upstream;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
