//! Explorer runtime initialization and lifecycle management.
//!
//! Wires the shared chain state, caches, node client, optional store and push channel, then
//! runs the four background workers under one cancellation token:
//!
//! - sync orchestrator (cache-only or persisted strategy, chosen from configuration)
//! - broadcast coordinator
//! - chain info worker
//! - transaction statistics worker
//!
//! # Example
//!
//! ```no_run
//! use explorer_core::{config::AppConfig, runtime::ExplorerRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!
//!     let mut runtime = ExplorerRuntime::builder().with_config(config).build().await?;
//!     runtime.start();
//!
//!     let reader = runtime.reader();
//!     // ... serve reads ...
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod lifecycle;

pub use builder::{ExplorerRuntimeBuilder, RuntimeError};
pub use components::ExplorerComponents;
pub use lifecycle::ExplorerRuntime;
