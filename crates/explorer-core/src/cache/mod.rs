//! In-memory block caches.
//!
//! # Architecture
//!
//! ```text
//!        ┌─────────────────────┐        ┌─────────────────────────┐
//!        │     BlockCache      │        │    RecentBlocksRing     │
//!        │                     │        │                         │
//!        │ • height → FullBlock│        │ • BlockSummary ring     │
//!        │ • hash validation   │        │ • most-recent-first     │
//!        │ • DashMap, pruned   │        │ • O(1) by height offset │
//!        └──────────┬──────────┘        └────────────┬────────────┘
//!                   │                                │
//!        ┌──────────▼────────────────────────────────▼──────────┐
//!        │                    ReorgDetector                      │
//!        │  re-checks the trailing window against the node and   │
//!        │  overwrites both caches on a hash mismatch            │
//!        └───────────────────────────────────────────────────────┘
//! ```
//!
//! Both caches are written only by the sync engine. The read surface
//! ([`ExplorerReader`](crate::reader::ExplorerReader)) goes through their accessors.

pub mod block_cache;
pub mod recent_blocks;
pub mod types;

pub use block_cache::{BlockCache, BlockCacheConfig, BlockCacheError, CachedBlock};
pub use recent_blocks::RecentBlocksRing;
pub use types::{BlockSummary, BlockTransaction, CacheStats, FullBlock, ProofType};
