//! Chain tip state and the broadcast coordinator that consumes it.
//!
//! # Architecture: Shared Ownership Pattern
//!
//! One [`ChainTipState`] is created at startup and handed to every worker as an `Arc`:
//!
//! ```text
//!                        ┌─────────────────┐
//!                        │  ChainTipState  │
//!                        └────────┬────────┘
//!          ┌──────────────┬───────┴───────┬──────────────────┐
//!          ▼              ▼               ▼                  ▼
//!  ┌──────────────┐ ┌───────────┐ ┌───────────────┐ ┌──────────────────┐
//!  │ Orchestrator │ │ ChainInfo │ │ TxStatsWorker │ │ Broadcast        │
//!  │ WRITES tip,  │ │ Worker    │ │ writes stats  │ │ Coordinator      │
//!  │ marks flag   │ │ writes    │ │               │ │ takes the flag,  │
//!  │              │ │ info      │ │               │ │ reads info       │
//!  └──────────────┘ └───────────┘ └───────────────┘ └──────────────────┘
//! ```
//!
//! Only the orchestrator writes the tip; only the coordinator clears the flag.

pub mod broadcast;
pub mod state;

pub use broadcast::BroadcastCoordinator;
pub use state::ChainTipState;
